use log::debug;

/// One remote log file and its size in bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub path: String,
    pub size: u64,
}

/// Parse `du -b` output, `<bytes>\t<path>` per line.
///
/// Lines that don't follow that shape are skipped.
pub fn parse_du_output(output: &str) -> Vec<LogEntry> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match parse_du_line(line) {
            Some(entry) => Some(entry),
            None => {
                debug!("skipping malformed du line: {:?}", line);
                None
            }
        })
        .collect()
}

fn parse_du_line(line: &str) -> Option<LogEntry> {
    let (size, path) = line.split_once('\t').or_else(|| line.trim_start().split_once(char::is_whitespace))?;
    let size = size.trim().parse().ok()?;
    let path = path.trim_end_matches(['\r', '\n']);
    if path.is_empty() {
        return None;
    }
    Some(LogEntry {
        path: path.to_string(),
        size,
    })
}

/// Sum of the sizes reported by `du -b`
pub fn total_size(output: &str) -> u64 {
    parse_du_output(output).iter().map(|entry| entry.size).sum()
}
