//! One-off upstream search command.

use console::style;

use crate::config::Settings;
use crate::models::SearchPage;
use crate::server::MAX_PAGE_SIZE;
use crate::upstream::{normalize_job, AdzunaClient, SearchQuery, SortBy};

pub struct SearchArgs {
    pub query: String,
    pub location: String,
    pub remote: bool,
    pub page: u32,
    pub limit: u32,
    pub json: bool,
}

/// Search the upstream API and print the normalized page.
pub async fn cmd_search(settings: &Settings, args: SearchArgs) -> anyhow::Result<()> {
    if !settings.upstream.has_credentials() {
        anyhow::bail!("ADZUNA_APP_ID and ADZUNA_APP_KEY must be set to search");
    }

    let client = AdzunaClient::new(&settings.upstream)?;
    let query = SearchQuery {
        what: args.query,
        location: args.location,
        remote: args.remote,
        page: args.page.max(1),
        results_per_page: args.limit.clamp(1, MAX_PAGE_SIZE),
        sort_by: SortBy::Date,
        ..SearchQuery::default()
    };

    let response = client.search(&query).await?;
    let jobs = response.results.iter().map(normalize_job).collect();
    let page = SearchPage::new(jobs, response.count, query.page, query.results_per_page);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    println!(
        "{} {} jobs (page {} of {})",
        style("→").cyan(),
        page.total,
        page.page,
        page.total_pages
    );
    for job in &page.jobs {
        let remote = if job.is_remote {
            style(" remote").green().to_string()
        } else {
            String::new()
        };
        println!(
            "  {} {} at {} ({}){}",
            style("•").dim(),
            style(&job.title).bold(),
            job.company,
            job.location,
            remote
        );
        println!("    {}", style(&job.apply_url).dim());
    }

    Ok(())
}
