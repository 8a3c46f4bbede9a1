use serde::Serialize;

/// Reporter names, in collected-row order. These are the keys the labels and
/// summary charts render.
pub const REPORTERS: [&str; 6] = [
    "Susceptible",
    "Exposed",
    "Infected",
    "Deaths",
    "Recovered",
    "Vaccinated",
];

/// One collected row of a location's reporters, in real-population units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ReporterRow {
    pub susceptible: u32,
    pub exposed: u32,
    pub infected: u32,
    pub deaths: u32,
    pub recovered: u32,
    pub vaccinated: u32,
}

impl ReporterRow {
    pub fn values(&self) -> [u32; 6] {
        [
            self.susceptible,
            self.exposed,
            self.infected,
            self.deaths,
            self.recovered,
            self.vaccinated,
        ]
    }
}

/// Per-location data collector: one row appended per model step, keyed
/// `loc_1` .. `loc_N`.
#[derive(Debug, Clone, Serialize)]
pub struct LocationCollector {
    pub key: String,
    rows: Vec<ReporterRow>,
}

impl LocationCollector {
    pub fn new(index_1based: usize) -> Self {
        Self {
            key: format!("loc_{}", index_1based),
            rows: Vec::new(),
        }
    }

    pub fn collect(&mut self, row: ReporterRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[ReporterRow] {
        &self.rows
    }

    pub fn latest(&self) -> Option<&ReporterRow> {
        self.rows.last()
    }

    /// One reporter's full series, by reporter name.
    pub fn series(&self, reporter: &str) -> Option<Vec<u32>> {
        let idx = REPORTERS.iter().position(|r| *r == reporter)?;
        Some(self.rows.iter().map(|row| row.values()[idx]).collect())
    }

    /// All series keyed by reporter name, the shape the chart widgets and the
    /// API serve.
    pub fn all_series(&self) -> serde_json::Value {
        let mut out = serde_json::Map::new();
        for (idx, reporter) in REPORTERS.iter().enumerate() {
            let series: Vec<u32> = self.rows.iter().map(|row| row.values()[idx]).collect();
            out.insert((*reporter).to_string(), serde_json::json!(series));
        }
        serde_json::Value::Object(out)
    }
}
