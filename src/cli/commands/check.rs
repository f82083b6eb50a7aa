//! Limiter inspection command.

use console::style;

use crate::config::{ConfigError, RateLimitSettings, Settings};
use crate::rate_limit::{
    open_store, retry_after_secs, RateLimitConfig, SlidingWindowLimiter, USER_CONTEXT,
};

/// Limits applied to `context`: the user tier for its own context, the IP
/// tier (the limiter default) for everything else.
fn config_for_context(
    rate_limit: &RateLimitSettings,
    context: &str,
) -> Result<RateLimitConfig, ConfigError> {
    if context == USER_CONTEXT {
        rate_limit.user_config()
    } else {
        rate_limit.ip_config()
    }
}

/// Record one hit for `identifier` in `context` and print the decision.
pub async fn cmd_check(settings: &Settings, identifier: &str, context: &str) -> anyhow::Result<()> {
    let ip_config = settings.rate_limit.ip_config()?;
    let config = config_for_context(&settings.rate_limit, context)?;
    let store = open_store(&settings.rate_limit.backend, &settings.database_url).await?;
    let limiter = SlidingWindowLimiter::new(store, ip_config);

    let decision = limiter.evaluate(identifier, context, &config).await?;

    if decision.allowed {
        println!(
            "{} {} allowed in '{}' ({} remaining)",
            style("✓").green(),
            identifier,
            context,
            decision.remaining
        );
    } else {
        let retry_after = retry_after_secs(decision.reset_at, limiter.clock().now());
        println!(
            "{} {} rate limited in '{}' (retry after {}s)",
            style("✗").red(),
            identifier,
            context,
            retry_after
        );
    }
    println!(
        "  Window: {} requests / {}s, resets at {}",
        config.max_requests(),
        config.window_secs(),
        decision.reset_at.to_rfc3339()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_context_uses_user_limits() {
        let rate_limit = RateLimitSettings {
            window_secs: 60,
            max_requests: 10,
            user_window_secs: 600,
            user_max_requests: 2,
            ..RateLimitSettings::default()
        };

        let user = config_for_context(&rate_limit, USER_CONTEXT).unwrap();
        assert_eq!((user.window_secs(), user.max_requests()), (600, 2));

        let ip = config_for_context(&rate_limit, "jobs:ip").unwrap();
        assert_eq!((ip.window_secs(), ip.max_requests()), (60, 10));

        let other = config_for_context(&rate_limit, "api").unwrap();
        assert_eq!(other, ip);
    }
}
