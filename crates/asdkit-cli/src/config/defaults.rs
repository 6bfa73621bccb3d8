pub struct DefaultsConfig {
    pub model: String,
    pub mixing_law: String,
    pub miscibility_method: String,
    pub temperature: f64,
    pub humidity: f64,
    pub timeframe: String,
    pub min_loading: f64,
    pub max_loading: f64,
    pub min_stability: f64,
    pub strategy: String,
    pub screening_loading: f64,
    pub max_workers: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            model: "rule_based".to_string(),
            mixing_law: "gordon_taylor".to_string(),
            miscibility_method: "hansen".to_string(),
            temperature: 25.0,
            humidity: 60.0,
            timeframe: "long_term".to_string(),
            min_loading: 0.1,
            max_loading: 0.5,
            min_stability: 0.7,
            strategy: "binary".to_string(),
            screening_loading: 0.3,
            max_workers: 4,
        }
    }
}
