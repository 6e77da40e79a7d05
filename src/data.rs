//! Competitor CSV loading.
//!
//! Reads a CSV with a header row containing the four required columns
//! (`Competitor Name`, `Product Description`, `Marketing Strategy`,
//! `Financial Summary`) into [`CompetitorRecord`]s. Column order is free and
//! extra columns are ignored.
//!
//! A missing file is replaced by the built-in ten-company demo dataset.
//! A missing required column fails the load. Individual rows that cannot
//! be decoded, or that leave any required field empty after cleaning, are
//! skipped and counted in [`LoadReport::skipped`].

use regex::Regex;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use rival_radar_core::models::{
    CompetitorRecord, COL_FINANCIAL, COL_MARKETING, COL_NAME, COL_PRODUCT, REQUIRED_COLUMNS,
};

/// Errors that abort a CSV load.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("CSV file {path} is missing required columns: {}", .missing.join(", "))]
    MissingColumns { path: PathBuf, missing: Vec<String> },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Outcome of a successful load.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub records: Vec<CompetitorRecord>,
    /// Rows dropped because they were malformed or missing a required field.
    pub skipped: usize,
    /// True when the file did not exist and the demo dataset was written.
    pub created_sample: bool,
    /// SHA-256 of the file bytes, hex encoded.
    pub fingerprint: String,
}

/// Demo dataset rows: name, product, marketing, financial.
pub const SAMPLE_COMPETITORS: [[&str; 4]; 10] = [
    [
        "TechCorp",
        "Enterprise cloud computing platform with AI-powered analytics and automated scaling",
        "Focus on enterprise clients with direct sales tech conferences and thought leadership content",
        "Revenue $500M Growth 25% YoY Market Cap $8B Strong enterprise customer base",
    ],
    [
        "InnovateLabs",
        "Machine learning solutions for predictive analytics and business intelligence",
        "Content marketing through whitepapers webinars and partnerships with universities",
        "Revenue $150M Growth 40% YoY Series D funding Expanding internationally",
    ],
    [
        "DataDynamic",
        "Big data processing platform with real-time streaming and visualization tools",
        "Freemium model with extensive documentation and developer community building",
        "Revenue $300M Growth 30% YoY IPO planned High customer retention rates",
    ],
    [
        "CloudFirst",
        "Multi-cloud management system with security and compliance automation",
        "Channel partnerships and reseller network with strong customer success programs",
        "Revenue $200M Growth 35% YoY Private equity backed Focus on profitability",
    ],
    [
        "AIForward",
        "Artificial intelligence framework for natural language processing applications",
        "Developer-first approach with open-source components and API-first strategy",
        "Revenue $100M Growth 50% YoY Venture funded Research and development heavy",
    ],
    [
        "SmartSolutions",
        "IoT connectivity platform with edge computing and device management",
        "Industry-specific solutions with vertical market penetration and case studies",
        "Revenue $80M Growth 45% YoY Bootstrapped Strong margins and cash flow",
    ],
    [
        "NextGenTech",
        "Blockchain-based supply chain management and traceability solutions",
        "Regulatory compliance focus with government and financial sector targeting",
        "Revenue $60M Growth 60% YoY Cryptocurrency revenues Volatile but growing",
    ],
    [
        "FutureSystems",
        "Cybersecurity suite with threat detection and incident response automation",
        "Fear-based marketing emphasizing security threats and compliance requirements",
        "Revenue $400M Growth 20% YoY Public company Acquisition strategy active",
    ],
    [
        "DigitalEdge",
        "Digital transformation consulting with custom software development",
        "Consultative selling with custom demos and proof-of-concept implementations",
        "Revenue $250M Growth 15% YoY Consulting margins Project-based revenue",
    ],
    [
        "ProActive",
        "Process automation tools for workflow optimization and task management",
        "Self-service platform with automated onboarding and usage-based pricing",
        "Revenue $120M Growth 55% YoY SaaS model High recurring revenue percentage",
    ],
];

/// Write the demo dataset to `path`, creating parent directories.
pub fn write_sample_csv(path: &Path) -> Result<(), DataError> {
    let io_err = |source| DataError::Io {
        path: path.to_path_buf(),
        source,
    };
    let csv_err = |source| DataError::Csv {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer.write_record(REQUIRED_COLUMNS).map_err(csv_err)?;
    for row in SAMPLE_COMPETITORS {
        writer.write_record(row).map_err(csv_err)?;
    }
    writer.flush().map_err(io_err)?;

    tracing::info!(path = %path.display(), "created sample competitor CSV");
    Ok(())
}

/// Clean a raw field: drop unusual punctuation, collapse whitespace, trim.
pub fn clean_field(raw: &str) -> String {
    static SPECIAL: OnceLock<Regex> = OnceLock::new();
    let special = SPECIAL.get_or_init(|| {
        Regex::new(r"[^\w\s\-.,()%$]").unwrap_or_else(|e| panic!("bad cleaning pattern: {e}"))
    });
    let replaced = special.replace_all(raw, " ");
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Hex SHA-256 of `bytes`.
pub fn fingerprint(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Fingerprint of the file at `path`, or `None` if it cannot be read.
pub fn file_fingerprint(path: &Path) -> Option<String> {
    std::fs::read(path).ok().map(|b| fingerprint(&b))
}

/// Load competitor records from `path`, writing the demo dataset first if
/// the file does not exist.
pub fn load_competitors(path: &Path) -> Result<LoadReport, DataError> {
    let created_sample = !path.exists();
    if created_sample {
        write_sample_csv(path)?;
    }

    let bytes = std::fs::read(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut report = parse_competitors(&bytes, path)?;
    report.created_sample = created_sample;

    tracing::info!(
        path = %path.display(),
        records = report.records.len(),
        skipped = report.skipped,
        "loaded competitor data"
    );
    Ok(report)
}

/// Parse CSV bytes. `path` is used for error messages only.
pub fn parse_competitors(bytes: &[u8], path: &Path) -> Result<LoadReport, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers = reader
        .byte_headers()
        .map_err(|source| DataError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .clone();

    let header_names: Vec<String> = headers
        .iter()
        .map(|h| {
            String::from_utf8_lossy(h)
                .trim_start_matches('\u{feff}')
                .trim()
                .to_string()
        })
        .collect();
    let column = |name: &str| header_names.iter().position(|h| h == name);

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| column(c).is_none())
        .map(|c| c.to_string())
        .collect();
    let (Some(i_name), Some(i_product), Some(i_marketing), Some(i_financial)) = (
        column(COL_NAME),
        column(COL_PRODUCT),
        column(COL_MARKETING),
        column(COL_FINANCIAL),
    ) else {
        return Err(DataError::MissingColumns {
            path: path.to_path_buf(),
            missing,
        });
    };

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for result in reader.records() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                tracing::warn!(line, error = %e, "skipping unreadable CSV row");
                skipped += 1;
                continue;
            }
        };
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        let field = |i: usize| clean_field(row.get(i).unwrap_or(""));
        let record = CompetitorRecord::new(
            field(i_name),
            field(i_product),
            field(i_marketing),
            field(i_financial),
        );

        if record.name.is_empty()
            || record.product_description.is_empty()
            || record.marketing_strategy.is_empty()
            || record.financial_summary.is_empty()
        {
            tracing::warn!(line, "skipping CSV row with a missing required field");
            skipped += 1;
            continue;
        }

        if records
            .iter()
            .any(|r: &CompetitorRecord| r.name.eq_ignore_ascii_case(&record.name))
        {
            tracing::warn!(line, name = %record.name, "duplicate competitor name");
        }
        records.push(record);
    }

    Ok(LoadReport {
        records,
        skipped,
        created_sample: false,
        fingerprint: fingerprint(bytes),
    })
}
