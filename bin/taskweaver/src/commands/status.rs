use taskweaver_core::{Config, Paths};

pub async fn run() -> anyhow::Result<()> {
    let config = Config::from_env();
    let paths = Paths::new();

    println!("taskweaver status");
    println!("=================");
    println!();

    println!("Home:        {}", paths.base.display());
    println!("Sessions:    {}", paths.sessions_dir().display());
    println!();

    println!("Model:       {}", config.gemini.model);
    println!(
        "Gemini key:  {}",
        if config.gemini.api_key.is_empty() { "✗ (GEMINI_API_KEY not set)" } else { "✓" }
    );
    println!(
        "Firecrawl:   {} ({})",
        if config.firecrawl.api_key.is_empty() { "✗ (FIRECRAWL_API_KEY not set)" } else { "✓" },
        config.firecrawl.api_base
    );
    println!("Browser CDP: {}", config.browser.cdp_url);

    if config.ensure_ready().is_err() {
        println!();
        println!("Set the missing environment variables before running `taskweaver agent`.");
    }

    Ok(())
}
