use colored::Colorize;

#[derive(Debug)]
pub struct UxError {
    pub what: String,
    pub why: Option<String>,
    pub how_to_fix: Vec<String>,
    pub suggested_command: Option<String>,
}

impl UxError {
    pub fn new(what: impl Into<String>) -> Self {
        Self {
            what: what.into(),
            why: None,
            how_to_fix: Vec::new(),
            suggested_command: None,
        }
    }

    pub fn why(mut self, reason: impl Into<String>) -> Self {
        self.why = Some(reason.into());
        self
    }

    pub fn fix(mut self, suggestion: impl Into<String>) -> Self {
        self.how_to_fix.push(suggestion.into());
        self
    }

    pub fn suggest(mut self, cmd: impl Into<String>) -> Self {
        self.suggested_command = Some(cmd.into());
        self
    }

    pub fn display(&self) {
        eprintln!();
        eprintln!("{} {}", "error:".red().bold(), self.what.white().bold());

        if let Some(why) = &self.why {
            eprintln!("       {}", why.dimmed());
        }

        if !self.how_to_fix.is_empty() {
            eprintln!();
            eprintln!("{}", "How to fix:".yellow().bold());
            for (i, fix) in self.how_to_fix.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, fix);
            }
        }

        if let Some(cmd) = &self.suggested_command {
            eprintln!();
            eprintln!("{}", "Try this:".green().bold());
            eprintln!("  $ {}", cmd.cyan());
        }
        eprintln!();
    }
}

impl std::fmt::Display for UxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.what)
    }
}

impl std::error::Error for UxError {}

/// Environment variable that sets a config field, where one exists.
fn env_var_for(field: &str) -> Option<&'static str> {
    match field {
        "source.tenant_id" => Some("TENANT_ID"),
        "source.client_id" => Some("CLIENT_ID"),
        "source.client_secret" => Some("CLIENT_SECRET"),
        "source.site_domain" => Some("TG_SITE_DOMAIN"),
        "source.site_name" => Some("TG_SITE_NAME"),
        "search.endpoint" => Some("AZURE_SEARCH_SERVICE_ENDPOINT"),
        "search.api_key" => Some("AZURE_SEARCH_ADMIN_KEY"),
        "embedding.endpoint" => Some("OPENAI_ENDPOINT"),
        "embedding.api_key" => Some("OPENAI_API_KEY"),
        _ => None
    }
}

pub fn missing_settings(command: &str, fields: &[String]) -> UxError {
    let mut err = UxError::new(format!("Missing settings for '{}': {}", command, fields.join(", ")))
        .why("These values have no default and are needed to reach the live services");
    for field in fields {
        err = match env_var_for(field) {
            Some(var) => err.fix(format!("Set {} (or `{}` in the config file)", var, field)),
            None => err.fix(format!("Set `{}` in the config file", field))
        };
    }
    err.suggest("tierguard config validate")
}

pub fn invalid_config(details: &impl std::fmt::Display) -> UxError {
    UxError::new("Configuration is invalid")
        .why(details.to_string())
        .fix("Correct the listed fields in the config file or environment")
        .suggest("tierguard config validate")
}

pub fn unknown_tier(tier: &str, known: &[String]) -> UxError {
    UxError::new(format!("Unknown tier: '{}'", tier))
        .why(format!("Configured tiers are: {}", known.join(", ")))
        .fix("Use one of the configured tier names")
        .suggest("tierguard tiers list")
}

pub fn invalid_grantee(value: &str) -> UxError {
    UxError::new(format!("Invalid grantee: '{}'", value))
        .why("Grantees are written as NAME:ROLE, with several roles separated by commas")
        .suggest("tierguard tiers resolve --grantee \"Contoso Owners:owner\"")
}
