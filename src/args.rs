use crate::criteria::DEFAULT_LIMIT;
use crate::error::{Result, VoyeurError};

pub struct ArgParser {
    iter: std::vec::IntoIter<String>,
}

impl ArgParser {
    pub fn new(args: Vec<String>) -> Self {
        Self { iter: args.into_iter() }
    }

    /// Extract the value following `flag`
    pub fn extract_value(&mut self, flag: &str) -> Result<String> {
        self.iter
            .next()
            .ok_or_else(|| VoyeurError::Usage(format!("Provide a value after {flag}")))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<String> {
        self.iter.next()
    }
}

/// Options of the single command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOptions {
    pub limit: usize,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub filter_tag: Option<String>,
    pub mark: bool,
    pub count: bool,
    pub stats_only: bool,
    pub output: Option<String>,
    pub help: bool,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            from_date: None,
            to_date: None,
            filter_tag: None,
            mark: false,
            count: false,
            stats_only: false,
            output: None,
            help: false,
        }
    }
}

pub fn parse(args: Vec<String>) -> Result<CliOptions> {
    let mut opts = CliOptions::default();
    let mut parser = ArgParser::new(args);

    while let Some(arg) = parser.next() {
        // Accept `--flag=value` as well as `--flag value`.
        let (flag, inline) = match arg.split_once('=') {
            Some((f, v)) if f.starts_with("--") => (f.to_string(), Some(v.to_string())),
            _ => (arg.clone(), None),
        };
        let value = |parser: &mut ArgParser| match inline.clone() {
            Some(v) => Ok(v),
            None => parser.extract_value(&flag),
        };

        match flag.as_str() {
            "-n" | "--limit" => {
                let raw = value(&mut parser)?;
                opts.limit = match raw.trim().parse::<usize>() {
                    Ok(n) if n > 0 => n,
                    _ => {
                        return Err(VoyeurError::Usage(format!(
                            "Limit must be a positive integer, got `{raw}`"
                        )));
                    }
                };
            }
            "-d" | "--from-date" => opts.from_date = Some(value(&mut parser)?),
            "-t" | "--to-date" => opts.to_date = Some(value(&mut parser)?),
            "--filter-tag" => {
                let tag = value(&mut parser)?;
                let tag = tag.trim();
                opts.filter_tag = (!tag.is_empty()).then(|| tag.to_string());
            }
            "-o" | "--output" => opts.output = Some(value(&mut parser)?),
            "--mark" => opts.mark = true,
            "-c" | "--count" => opts.count = true,
            "--stats-only" => opts.stats_only = true,
            "-h" | "--help" => opts.help = true,
            other => {
                return Err(VoyeurError::Usage(format!("Unknown flag: {other}")));
            }
        }
    }
    Ok(opts)
}
