/// Words rendered fully upper-case in run titles.
const ABBREVIATIONS: &[&str] = &["cs", "ai", "cv", "lg", "th", "daily", "trending", "repo"];

/// Display title for a case identifier (`arxiv_cs_daily` -> `Arxiv CS DAILY`).
pub fn format_title(case: &str) -> String {
    case.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let lower = part.to_lowercase();
            if ABBREVIATIONS.contains(&lower.as_str()) {
                lower.to_uppercase()
            } else {
                let mut chars = lower.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
