pub mod age;
pub mod epidemic;
pub mod location;
pub mod person;
