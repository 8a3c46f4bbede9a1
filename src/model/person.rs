use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Susceptible,
    Exposed,
    Infected,
    Recovered,
    Dead,
    Vaccinated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViralLoad {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Exposed,
    Mild,
    Moderate,
    Severe,
}

/// A scaled person agent: each one stands for `scale` real people of its
/// home location.
#[derive(Debug, Clone)]
pub struct Person {
    pub age: u8,
    pub location: usize,
    pub status: HealthStatus,
    pub viral_load: ViralLoad,
    pub severity: Severity,
    pub facemask: bool,
    pub distancing: bool,
    pub immunity: f64,
    pub in_quarantine: bool,
    pub in_lockdown: bool,
    pub vaccine_hesitant: bool,
    pub time_infected: u32,
}

impl Person {
    pub fn susceptible(age: u8, location: usize) -> Self {
        Self {
            age,
            location,
            status: HealthStatus::Susceptible,
            viral_load: ViralLoad::Low,
            severity: Severity::Mild,
            facemask: false,
            distancing: false,
            immunity: 0.0,
            in_quarantine: false,
            in_lockdown: false,
            vaccine_hesitant: false,
            time_infected: 0,
        }
    }

    pub fn is_susceptible(&self) -> bool {
        self.status == HealthStatus::Susceptible
    }

    /// Exposed agents carry the disease too; they render and count as the
    /// infected branch with `Severity::Exposed`.
    pub fn is_infected(&self) -> bool {
        matches!(self.status, HealthStatus::Exposed | HealthStatus::Infected)
    }

    pub fn is_recovered(&self) -> bool {
        self.status == HealthStatus::Recovered
    }

    pub fn is_dead(&self) -> bool {
        self.status == HealthStatus::Dead
    }

    pub fn is_vaccinated(&self) -> bool {
        self.status == HealthStatus::Vaccinated
    }
}

#[cfg(test)]
mod tests {
    use super::{HealthStatus, Person};

    #[test]
    fn exposed_counts_as_infected() {
        let mut p = Person::susceptible(30, 0);
        assert!(p.is_susceptible());
        assert!(!p.is_infected());
        p.status = HealthStatus::Exposed;
        assert!(p.is_infected());
        p.status = HealthStatus::Infected;
        assert!(p.is_infected());
        p.status = HealthStatus::Recovered;
        assert!(!p.is_infected());
    }
}
