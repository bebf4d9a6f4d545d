// src/plugins/shodan.rs
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde::{Serialize, Deserialize};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::ShodanConfig;
use crate::core::{OutputLayout, Target, Tool, ToolAdapter};
use crate::error::{DossierResult, DossierError};
use crate::reporting::pdf::{Block, Color, PdfDocument, Span, Table};
use crate::utils::HttpClient;

const NOT_AVAILABLE: &str = "N/A";

/// Severity implied by the color class of a CVE tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VulnSeverity {
    Critical,
    Warning,
    Informational,
    Unclassified,
}

impl VulnSeverity {
    pub fn from_class(class: &str) -> Self {
        let classes: Vec<&str> = class.split_whitespace().collect();
        if classes.contains(&"bg-danger") {
            VulnSeverity::Critical
        } else if classes.contains(&"bg-warning") {
            VulnSeverity::Warning
        } else if classes.contains(&"bg-info") {
            VulnSeverity::Informational
        } else {
            VulnSeverity::Unclassified
        }
    }

    pub fn color(&self) -> Color {
        match self {
            VulnSeverity::Critical => Color::Red,
            VulnSeverity::Warning => Color::Orange,
            VulnSeverity::Informational => Color::Blue,
            VulnSeverity::Unclassified => Color::Gray,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub cve_id: String,
    pub severity: VulnSeverity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralInfo {
    #[serde(rename = "Hostnames")]
    pub hostnames: String,
    #[serde(rename = "Domains")]
    pub domains: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "ISP")]
    pub isp: String,
    #[serde(rename = "ASN")]
    pub asn: String,
}

impl Default for GeneralInfo {
    fn default() -> Self {
        Self {
            hostnames: NOT_AVAILABLE.to_string(),
            domains: NOT_AVAILABLE.to_string(),
            country: NOT_AVAILABLE.to_string(),
            city: NOT_AVAILABLE.to_string(),
            isp: NOT_AVAILABLE.to_string(),
            asn: NOT_AVAILABLE.to_string(),
        }
    }
}

impl GeneralInfo {
    /// Label/value pairs in display order
    pub fn rows(&self) -> [(&'static str, &str); 6] {
        [
            ("Hostnames", self.hostnames.as_str()),
            ("Domains", self.domains.as_str()),
            ("Country", self.country.as_str()),
            ("City", self.city.as_str()),
            ("ISP", self.isp.as_str()),
            ("ASN", self.asn.as_str()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDetails {
    #[serde(rename = "Technology")]
    pub technology: String,
    #[serde(rename = "Vulnerabilities")]
    pub vulnerabilities: Vec<Vulnerability>,
}

/// Everything extracted for one host; missing fields keep their defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    #[serde(rename = "IP Address")]
    pub ip_address: String,
    #[serde(rename = "Domain")]
    pub domain: String,
    #[serde(rename = "General Information")]
    pub general: GeneralInfo,
    #[serde(rename = "Ports")]
    pub ports: BTreeMap<u16, PortDetails>,
}

impl HostRecord {
    pub fn new(target: &Target) -> Self {
        Self {
            ip_address: target.address.clone(),
            domain: target.name.clone(),
            general: GeneralInfo::default(),
            ports: BTreeMap::new(),
        }
    }
}

fn element_text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Text pieces of an element, trimmed, empty ones dropped
fn text_pieces(element: ElementRef) -> Vec<String> {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Deduplicate by id keeping the first occurrence, then order by severity
pub fn rank_vulnerabilities(found: Vec<Vulnerability>) -> Vec<Vulnerability> {
    let mut seen = HashSet::new();
    let mut unique: Vec<Vulnerability> = found
        .into_iter()
        .filter(|v| seen.insert(v.cve_id.clone()))
        .collect();

    unique.sort_by_key(|v| v.severity);
    unique
}

fn extract_general(document: &Html, record: &mut HostRecord) {
    let (Ok(rows), Ok(cells)) = (Selector::parse("tr"), Selector::parse("th, td")) else {
        return;
    };

    for row in document.select(&rows) {
        let row_cells: Vec<ElementRef> = row.select(&cells).collect();
        let [label, value, ..] = row_cells.as_slice() else { continue };

        let label = element_text(*label);
        let general = &mut record.general;
        let slot = match label.as_str() {
            "Hostnames" => {
                general.hostnames = text_pieces(*value).join(", ");
                continue;
            }
            "Domains" => {
                general.domains = text_pieces(*value).join(" ").replace('\u{a0}', " ");
                continue;
            }
            "Country" => &mut general.country,
            "City" => &mut general.city,
            "ISP" => &mut general.isp,
            "ASN" => &mut general.asn,
            _ => continue,
        };
        *slot = element_text(*value);
    }
}

/// First `div` sibling after the port heading holds that port's banner
fn port_banner<'a>(document: &'a Html, port: &str) -> Option<ElementRef<'a>> {
    let heading = Selector::parse(&format!("h6[id='{}']", port)).ok()?;
    let heading = document.select(&heading).next()?;

    heading
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|sibling| sibling.value().name() == "div")
}

fn extract_port(document: &Html, port: &str) -> PortDetails {
    let mut details = PortDetails {
        technology: "Unknown".to_string(),
        vulnerabilities: Vec::new(),
    };

    let Some(banner) = port_banner(document, port) else {
        return details;
    };

    if let Ok(title) = Selector::parse(".banner-title") {
        if let Some(technology) = banner.select(&title).next().map(element_text).filter(|t| !t.is_empty()) {
            details.technology = technology;
        }
    }

    if let Ok(tags) = Selector::parse(".cve-list a.cve-tag") {
        let found = banner
            .select(&tags)
            .filter_map(|tag| {
                let cve_id = element_text(tag);
                // "+N more" links are not CVEs
                if cve_id.contains("more") {
                    return None;
                }
                let severity = VulnSeverity::from_class(tag.value().attr("class").unwrap_or(""));
                Some(Vulnerability { cve_id, severity })
            })
            .collect();
        details.vulnerabilities = rank_vulnerabilities(found);
    }

    details
}

/// Extract a host record from a rendered host page
pub fn parse_host_page(html: &str, target: &Target) -> HostRecord {
    let document = Html::parse_document(html);
    let mut record = HostRecord::new(target);

    extract_general(&document, &mut record);

    if let Ok(port_links) = Selector::parse("#ports a") {
        for link in document.select(&port_links) {
            let label = element_text(link);
            match label.parse::<u16>() {
                Ok(port) => {
                    record.ports.insert(port, extract_port(&document, &label));
                }
                Err(_) => debug!("Ignoring port link {:?}", label),
            }
        }
    }

    record
}

/// Lay out the host record as a PDF
pub fn build_report(record: &HostRecord) -> PdfDocument {
    let mut document = PdfDocument::new();
    document
        .push(Block::Title(format!("Shodan Report for {} ({})", record.ip_address, record.domain)))
        .push(Block::Spacer(12.0))
        .push(Block::Heading(vec![Span::plain("General Information:")]));

    let general_rows = record
        .general
        .rows()
        .iter()
        .map(|(label, value)| vec![vec![Span::plain(*label)], vec![Span::plain(*value)]])
        .collect();
    document
        .push(Block::Table(Table::new(general_rows).with_column_widths(vec![100.0, 300.0])))
        .push(Block::Spacer(12.0));

    if record.ports.is_empty() {
        document
            .push(Block::Paragraph(vec![Span::plain("No open ports found.")]))
            .push(Block::Spacer(12.0));
        return document;
    }

    for (index, (port, details)) in record.ports.iter().enumerate() {
        if index > 0 {
            document.push(Block::PageBreak);
        }
        document
            .push(Block::Heading(vec![Span::plain(format!("Port {}:", port))]))
            .push(Block::Paragraph(vec![Span::plain(format!("Technology: {}", details.technology))]))
            .push(Block::Spacer(6.0))
            .push(Block::Heading(vec![Span::plain("Vulnerabilities:")]));

        if details.vulnerabilities.is_empty() {
            document.push(Block::Paragraph(vec![Span::plain("No vulnerabilities found.")]));
        } else {
            let rows = details
                .vulnerabilities
                .chunks(3)
                .map(|chunk| {
                    chunk
                        .iter()
                        .map(|v| vec![Span::colored(v.cve_id.clone(), v.severity.color())])
                        .collect()
                })
                .collect();
            document.push(Block::Table(Table::new(rows).with_column_widths(vec![150.0, 150.0, 150.0])));
        }
        document.push(Block::Spacer(12.0));
    }

    document
}

/// Remote-lookup adapter: host page to JSON record and PDF
pub struct ShodanAdapter {
    http: HttpClient,
    base_url: String,
    layout: OutputLayout,
}

impl ShodanAdapter {
    pub fn new(config: &ShodanConfig, http: HttpClient, layout: OutputLayout) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            layout,
        }
    }

    async fn lookup(&self, target: &Target) -> HostRecord {
        let url = format!("{}/{}", self.base_url, target.address);

        match self.http.get_text(&url).await {
            Ok(html) => parse_host_page(&html, target),
            Err(e) => {
                warn!("Host page for {} unavailable, writing defaults: {}", target.address, e);
                HostRecord::new(target)
            }
        }
    }
}

#[async_trait]
impl ToolAdapter for ShodanAdapter {
    fn tool(&self) -> Tool {
        Tool::RemoteLookup
    }

    async fn setup(&mut self) -> DossierResult<()> {
        let dir = self.layout.dir(Tool::RemoteLookup);
        fs::create_dir_all(dir).await.map_err(|e| DossierError::file(dir, e))
    }

    async fn run_target(&mut self, target: &Target) -> DossierResult<PathBuf> {
        if target.is_degraded() {
            return Err(DossierError::InvalidInput(format!("no address to look up for {}", target.name)));
        }

        let record = self.lookup(target).await;
        debug!("{} ports found for {}", record.ports.len(), target);

        let pdf_path = self.layout.expected_path(Tool::RemoteLookup, target);
        let json_path = pdf_path.with_extension("json");

        let json = serde_json::to_string_pretty(&record)?;
        fs::write(&json_path, json)
            .await
            .map_err(|e| DossierError::file(&json_path, e))?;

        build_report(&record).save(&pdf_path)?;
        info!("Reports saved: {}, {}", json_path.display(), pdf_path.display());

        Ok(pdf_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST_PAGE: &str = r##"<html><body>
        <table>
          <tr><td>Hostnames</td><td><strong>a.example.com</strong><br><strong>b.example.com</strong></td></tr>
          <tr><td>Domains</td><td>example.com&nbsp;example.org</td></tr>
          <tr><td>Country</td><td>Spain</td></tr>
          <tr><td>City</td><td>Madrid</td></tr>
          <tr><td>ISP</td><td>Example Networks</td></tr>
        </table>
        <div id="ports"><a href="#443">443</a><a href="#80">80</a><a href="#x">more</a></div>
        <h6 id="80">80 / tcp</h6>
        <div class="banner">
          <h1 class="banner-title">nginx</h1>
          <div class="cve-list">
            <a class="cve-tag bg-info">CVE-2021-0003</a>
            <a class="cve-tag bg-danger">CVE-2021-0001</a>
            <a class="cve-tag bg-gray">CVE-2021-0004</a>
            <a class="cve-tag bg-danger">CVE-2021-0001</a>
            <a class="cve-tag">+ 12 more</a>
            <a class="cve-tag bg-warning">CVE-2021-0002</a>
          </div>
        </div>
        <h6 id="443">443 / tcp</h6>
        <div class="banner"><pre>no title here</pre></div>
    </body></html>"##;

    fn target() -> Target {
        Target::parse("203.0.113.5 : example.com")
    }

    #[test]
    fn test_general_information_extraction() {
        let record = parse_host_page(HOST_PAGE, &target());

        assert_eq!(record.ip_address, "203.0.113.5");
        assert_eq!(record.general.hostnames, "a.example.com, b.example.com");
        assert_eq!(record.general.domains, "example.com example.org");
        assert_eq!(record.general.country, "Spain");
        assert_eq!(record.general.city, "Madrid");
        assert_eq!(record.general.isp, "Example Networks");
        assert_eq!(record.general.asn, "N/A");
    }

    #[test]
    fn test_ports_are_scoped_deduplicated_and_ranked() {
        let record = parse_host_page(HOST_PAGE, &target());
        assert_eq!(record.ports.keys().copied().collect::<Vec<_>>(), vec![80, 443]);

        let http = &record.ports[&80];
        assert_eq!(http.technology, "nginx");
        let ids: Vec<&str> = http.vulnerabilities.iter().map(|v| v.cve_id.as_str()).collect();
        assert_eq!(ids, vec!["CVE-2021-0001", "CVE-2021-0002", "CVE-2021-0003", "CVE-2021-0004"]);
        assert_eq!(http.vulnerabilities[3].severity, VulnSeverity::Unclassified);

        let https = &record.ports[&443];
        assert_eq!(https.technology, "Unknown");
        assert!(https.vulnerabilities.is_empty());
    }

    #[test]
    fn test_rank_keeps_first_occurrence_and_is_stable() {
        let v = |id: &str, severity| Vulnerability { cve_id: id.to_string(), severity };
        let ranked = rank_vulnerabilities(vec![
            v("B", VulnSeverity::Informational),
            v("A", VulnSeverity::Informational),
            v("B", VulnSeverity::Critical),
            v("C", VulnSeverity::Warning),
        ]);

        assert_eq!(ranked, vec![
            v("C", VulnSeverity::Warning),
            v("B", VulnSeverity::Informational),
            v("A", VulnSeverity::Informational),
        ]);
    }

    #[test]
    fn test_empty_page_keeps_defaults() {
        let record = parse_host_page("<html></html>", &target());
        assert_eq!(record, HostRecord::new(&target()));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["General Information"]["Country"], "N/A");
        assert_eq!(json["IP Address"], "203.0.113.5");
    }

    #[test]
    fn test_report_layout() {
        let record = parse_host_page(HOST_PAGE, &target());
        let document = build_report(&record);
        let blocks = document.blocks();

        assert_eq!(blocks[0], Block::Title("Shodan Report for 203.0.113.5 (example.com)".to_string()));
        assert_eq!(blocks.iter().filter(|b| **b == Block::PageBreak).count(), 1);
        assert!(blocks.contains(&Block::Paragraph(vec![Span::plain("No vulnerabilities found.")])));

        let cve_table = blocks.iter().find_map(|b| match b {
            Block::Table(t) if t.column_widths == Some(vec![150.0, 150.0, 150.0]) => Some(t),
            _ => None,
        }).unwrap();
        assert_eq!(cve_table.rows.len(), 2);
        assert_eq!(cve_table.rows[0][0], vec![Span::colored("CVE-2021-0001", Color::Red)]);

        let empty = build_report(&HostRecord::new(&target()));
        assert!(empty.blocks().contains(&Block::Paragraph(vec![Span::plain("No open ports found.")])));
    }

    #[tokio::test]
    async fn test_unreachable_lookup_still_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::under(dir.path());
        let config = ShodanConfig { base_url: "http://127.0.0.1:9/host".to_string() };
        let http = HttpClient::new(None, Some(1)).unwrap();

        let mut adapter = ShodanAdapter::new(&config, http, layout.clone());
        adapter.setup().await.unwrap();
        let pdf_path = adapter.run_target(&target()).await.unwrap();

        assert_eq!(pdf_path, dir.path().join("shodan_reports/203.0.113.5_example_com.pdf"));
        assert!(pdf_path.exists());
        let json = std::fs::read_to_string(dir.path().join("shodan_reports/203.0.113.5_example_com.json")).unwrap();
        let record: HostRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, HostRecord::new(&target()));
    }

    #[tokio::test]
    async fn test_degraded_target_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let http = HttpClient::new(None, Some(1)).unwrap();
        let mut adapter = ShodanAdapter::new(&ShodanConfig::default(), http, OutputLayout::under(dir.path()));

        let result = adapter.run_target(&Target::parse("example.com")).await;
        assert!(matches!(result, Err(DossierError::InvalidInput(_))));
    }
}
