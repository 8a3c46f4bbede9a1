pub mod portrayal;
pub mod widgets;
