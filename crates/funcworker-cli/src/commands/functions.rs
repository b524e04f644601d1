//! Function listing.

use funcworker_runtime::HandlerCatalog;

use crate::error::CliResult;
use crate::samples;

/// One line per registered handler.
pub fn lines(catalog: &HandlerCatalog) -> Vec<String> {
    catalog
        .names()
        .into_iter()
        .map(|(name, entry_point)| format!("{name}\t{entry_point}"))
        .collect()
}

/// Print the functions this worker can load.
pub fn list() -> CliResult<()> {
    for line in lines(&samples::catalog()) {
        println!("{line}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_sorted_samples() {
        let lines = lines(&samples::catalog());
        assert_eq!(lines.first().map(String::as_str), Some("BlobTrigger\tRun"));
        assert!(lines.contains(&"HttpTriggerHttpResponse\tRun".to_string()));
        assert!(lines.windows(2).all(|pair| pair[0] <= pair[1]));
    }
}
