use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_hostname: String,
    pub api_key: String,
    pub assistant_id: String,
    pub greeting: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let api_hostname = env::var("CONCIERGE_API_HOSTNAME")
            .unwrap_or_else(|_| "https://api.openai.com".to_string());
        let api_key =
            env::var("OPENAI_API_KEY").unwrap_or_else(|_| "thiswontworkforopenai".to_string());
        let assistant_id =
            env::var("CONCIERGE_ASSISTANT_ID").expect("Missing env var CONCIERGE_ASSISTANT_ID");
        let greeting = env::var("CONCIERGE_GREETING")
            .unwrap_or_else(|_| "Hi! How can I assist you today?".to_string());

        Self {
            api_hostname,
            api_key,
            assistant_id,
            greeting,
        }
    }
}
