use crate::cli::args::CliArgs;
use crate::runner::Mode;

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if args.threads == Some(0) {
        return Err("invalid --threads, expected positive integer".to_string());
    }
    if args.rate == Some(0) {
        return Err("invalid --rate, expected positive integer".to_string());
    }
    if args.timeout == Some(0) {
        return Err("invalid --timeout, expected positive integer".to_string());
    }
    if let Some(raw) = args.miss_status.as_deref() {
        crate::utils::parse_u16_set_csv(raw)
            .map_err(|e| format!("invalid --miss-status '{raw}': {e}"))?;
    }
    Ok(())
}

/// Decides the scan mode from the shape of the target argument, the same way
/// the positional `PATH` is documented: a URL with a scheme scans paths, a
/// bare FQDN scans subdomains.
pub fn detect_mode(target: &str) -> Result<Mode, String> {
    let target = target.trim();
    if target.is_empty() {
        return Err("path is invalid".to_string());
    }
    if let Ok(url) = reqwest::Url::parse(target) {
        return match url.scheme() {
            "http" | "https" if url.has_host() => Ok(Mode::HttpPath),
            _ => Err("path is invalid".to_string()),
        };
    }
    // no scheme: treat it as a domain name, which must not look like a path
    if target.contains('/') || target.contains(' ') {
        return Err("path is invalid".to_string());
    }
    Ok(Mode::DnsSubdomain)
}
