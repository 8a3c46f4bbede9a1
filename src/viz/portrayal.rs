use serde::Serialize;

use crate::model::person::{Person, Severity, ViralLoad};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Color {
    White,
    Gray,
    Green,
    Orange,
    Red,
    Black,
    Yellow,
    Blue,
}

/// Render attributes for one person agent. Field names match the map
/// front-end's expected labels, typo included.
#[derive(Debug, Clone, Serialize)]
pub struct PersonPortrayal {
    pub radius: &'static str,
    #[serde(rename = "Shape")]
    pub shape: &'static str,
    #[serde(rename = "Age")]
    pub age: u8,
    #[serde(rename = "Viral Load")]
    pub viral_load: ViralLoad,
    #[serde(rename = "Severity")]
    pub severity: Severity,
    #[serde(rename = "Status")]
    pub status: crate::model::person::HealthStatus,
    #[serde(rename = "Wearing Masks")]
    pub facemask: bool,
    #[serde(rename = "Physical Distance")]
    pub distancing: bool,
    #[serde(rename = "Immunity")]
    pub immunity: f64,
    #[serde(rename = "In Quarantine Facility/Hospital")]
    pub in_quarantine: bool,
    #[serde(rename = "In Lockdown")]
    pub in_lockdown: bool,
    #[serde(rename = "Vaccine Hesistancy")]
    pub vaccine_hesitant: bool,
    #[serde(rename = "Time Infected")]
    pub time_infected: u32,
    pub color: Color,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionPortrayal {
    pub color: Color,
}

pub fn person_color(person: &Person) -> Color {
    if person.is_susceptible() {
        if person.facemask {
            Color::White
        } else {
            Color::Gray
        }
    } else if person.is_infected() {
        if person.viral_load == ViralLoad::High {
            Color::Green
        } else if person.severity == Severity::Exposed {
            Color::Orange
        } else {
            Color::Red
        }
    } else if person.is_recovered() {
        Color::Green
    } else if person.is_dead() {
        Color::Black
    } else {
        // vaccinated is the only status left
        Color::Yellow
    }
}

pub fn person_portrayal(person: &Person) -> PersonPortrayal {
    PersonPortrayal {
        radius: "1",
        shape: "Circle",
        age: person.age,
        viral_load: person.viral_load,
        severity: person.severity,
        status: person.status,
        facemask: person.facemask,
        distancing: person.distancing,
        immunity: person.immunity,
        in_quarantine: person.in_quarantine,
        in_lockdown: person.in_lockdown,
        vaccine_hesitant: person.vaccine_hesitant,
        time_infected: person.time_infected,
        color: person_color(person),
    }
}

pub fn region_portrayal() -> RegionPortrayal {
    RegionPortrayal { color: Color::Blue }
}

#[cfg(test)]
mod tests {
    use super::{person_color, person_portrayal, region_portrayal, Color};
    use crate::model::person::{HealthStatus, Person, Severity, ViralLoad};

    fn person(status: HealthStatus) -> Person {
        let mut p = Person::susceptible(42, 0);
        p.status = status;
        p
    }

    #[test]
    fn susceptible_colors_depend_on_facemask() {
        let mut p = person(HealthStatus::Susceptible);
        assert_eq!(person_color(&p), Color::Gray);
        p.facemask = true;
        assert_eq!(person_color(&p), Color::White);
    }

    #[test]
    fn infected_colors_follow_viral_load_then_severity() {
        let mut p = person(HealthStatus::Infected);
        p.viral_load = ViralLoad::High;
        assert_eq!(person_color(&p), Color::Green);

        p.viral_load = ViralLoad::Medium;
        p.severity = Severity::Exposed;
        assert_eq!(person_color(&p), Color::Orange);

        p.severity = Severity::Severe;
        assert_eq!(person_color(&p), Color::Red);

        // exposed agents take the infected branch
        let mut e = person(HealthStatus::Exposed);
        e.severity = Severity::Exposed;
        assert_eq!(person_color(&e), Color::Orange);
    }

    #[test]
    fn terminal_status_colors() {
        assert_eq!(person_color(&person(HealthStatus::Recovered)), Color::Green);
        assert_eq!(person_color(&person(HealthStatus::Dead)), Color::Black);
        assert_eq!(person_color(&person(HealthStatus::Vaccinated)), Color::Yellow);
    }

    #[test]
    fn portrayal_serializes_with_frontend_labels() {
        let p = person(HealthStatus::Susceptible);
        let json = serde_json::to_value(person_portrayal(&p)).expect("serialize");
        assert_eq!(json["radius"], "1");
        assert_eq!(json["Shape"], "Circle");
        assert_eq!(json["Age"], 42);
        assert_eq!(json["Status"], "Susceptible");
        assert_eq!(json["Vaccine Hesistancy"], false);
        assert_eq!(json["color"], "Gray");

        let region = serde_json::to_value(region_portrayal()).expect("serialize");
        assert_eq!(region["color"], "Blue");
    }
}
