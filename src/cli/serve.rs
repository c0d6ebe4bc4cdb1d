//! Web server command.

use console::style;

use crate::config::Settings;

const DEFAULT_PORT: u16 = 7071;

/// Start the web server.
pub async fn cmd_serve(settings: &Settings, bind: Option<&str>) -> anyhow::Result<()> {
    let bind = bind.unwrap_or(settings.bind.as_str());
    let (host, port) = parse_bind_address(bind)?;

    if settings.document_intelligence_endpoint.is_empty() {
        eprintln!(
            "{} No analysis endpoint configured; analyze calls will fail until DOCUMENT_INTELLIGENCE_ENDPOINT is set",
            style("!").yellow()
        );
    }
    if settings.enable_review_storage {
        println!(
            "{} Review storage: {} ({})",
            style("→").cyan(),
            settings.storage_backend.as_str(),
            settings.review_storage_dir.display()
        );
    } else {
        println!("{} Review storage disabled", style("→").cyan());
    }

    println!(
        "{} Starting docroute server at http://{}:{}",
        style("→").cyan(),
        host,
        port
    );
    println!("  Press Ctrl+C to stop");

    crate::server::serve(settings, &host, port).await
}

/// Parse a bind address that can be:
/// - Just a port: "7071" -> 127.0.0.1:7071
/// - Just a host: "0.0.0.0" -> 0.0.0.0:7071
/// - Host and port: "0.0.0.0:7071" -> 0.0.0.0:7071
fn parse_bind_address(bind: &str) -> anyhow::Result<(String, u16)> {
    let bind = bind.trim();
    if bind.is_empty() {
        anyhow::bail!("Bind address is empty");
    }

    if let Ok(port) = bind.parse::<u16>() {
        return Ok(("127.0.0.1".to_string(), port));
    }

    if let Some((host, port_str)) = bind.rsplit_once(':') {
        if let Ok(port) = port_str.parse::<u16>() {
            return Ok((host.to_string(), port));
        }
    }

    Ok((bind.to_string(), DEFAULT_PORT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bind_address() {
        assert_eq!(
            parse_bind_address("8080").unwrap(),
            ("127.0.0.1".to_string(), 8080)
        );
        assert_eq!(
            parse_bind_address("0.0.0.0").unwrap(),
            ("0.0.0.0".to_string(), DEFAULT_PORT)
        );
        assert_eq!(
            parse_bind_address("0.0.0.0:9000").unwrap(),
            ("0.0.0.0".to_string(), 9000)
        );
        assert!(parse_bind_address("  ").is_err());
    }
}
