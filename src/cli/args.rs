use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "webenum",
    version,
    about = "Bruteforce HTTP URIs and subdomains",
    long_about = "Webenum bruteforces HTTP paths and DNS subdomains from a wordlist, recursing into every hit up to a configurable depth.\n\nExamples:\n  webenum words.txt https://target.tld/\n  webenum words.txt target.tld -d 1 -t 128\n  webenum words.txt https://target.tld/ -j -o results.json\n\nThe mode is picked from the target: a URL scans paths, a bare FQDN scans subdomains."
)]
pub struct CliArgs {
    #[arg(value_name = "WORDLIST", help = "Wordlist file, one candidate per line.")]
    pub wordlist: String,

    #[arg(value_name = "PATH", help = "Either URI or FQDN.")]
    pub path: String,

    #[arg(
        short = 's',
        long = "trailing-slash",
        help_heading = "Scan",
        help = "Append trailing slash to tested URLs."
    )]
    pub trailing_slash: bool,

    #[arg(
        short = 'd',
        long = "depth",
        value_name = "N",
        help_heading = "Scan",
        help = "Expand hits into new rounds up to this depth (0 = no recursion)."
    )]
    pub depth: Option<usize>,

    #[arg(
        short = 't',
        long = "threads",
        value_name = "N",
        help_heading = "Performance",
        help = "How many workers to run. More - faster scanning."
    )]
    pub threads: Option<usize>,

    #[arg(
        short = 'r',
        long = "rate",
        value_name = "RPS",
        help_heading = "Performance",
        help = "Probe rate limit (probes per second)."
    )]
    pub rate: Option<u32>,

    #[arg(
        long = "timeout",
        value_name = "SECONDS",
        help_heading = "Performance",
        help = "Per-probe timeout."
    )]
    pub timeout: Option<usize>,

    #[arg(
        long = "retries",
        value_name = "N",
        help_heading = "Performance",
        help = "Transport-failure retries per probe before it counts as an error."
    )]
    pub retries: Option<u32>,

    #[arg(
        short = 'p',
        long = "proxy",
        value_name = "URL",
        help_heading = "Scan",
        help = "HTTP proxy for path probes (ignored for subdomain scans)."
    )]
    pub proxy: Option<String>,

    #[arg(
        long = "miss-status",
        value_name = "CODES",
        help_heading = "Scan",
        help = "Status codes classified as a miss (comma-separated)."
    )]
    pub miss_status: Option<String>,

    #[arg(
        short = 'j',
        long = "json",
        help_heading = "Output",
        help = "Output scan results as JSON."
    )]
    pub json: bool,

    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "Write results to a file instead of stdout."
    )]
    pub output: Option<String>,

    #[arg(
        short = 'C',
        long = "config",
        value_name = "FILE",
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.webenum/config.yml)."
    )]
    pub config: Option<String>,
}
