//! Inspection driver: load, select, resolve, report.
//!
//! Model errors on individual references are recorded in the report and
//! counted; internal resolver assertions abort the run.

use crate::args::{CliArgs, OutputFormat};
use anyhow::{Context, Result, bail};
use cdsc_common::{DocumentPath, Location};
use cdsc_model::{NodeId, SchemaDocument, StructuralFacts};
use cdsc_resolver::{ResolveError, Resolver, ResolverOptions, collect_ref_paths};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Outcome of resolving one reference path.
#[derive(Debug, Default, Serialize)]
pub struct ReferenceReport {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(rename = "semanticLocation", skip_serializing_if = "Option::is_none")]
    pub semantic_location: Option<String>,
}

/// Origin and effective type of one member.
#[derive(Debug, Default, Serialize)]
pub struct MemberReport {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(rename = "effectiveType", skip_serializing_if = "Option::is_none")]
    pub effective_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct Report {
    pub references: Vec<ReferenceReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<MemberReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub snapshots: Vec<Value>,
    /// Number of model errors recorded above.
    pub errors: usize,
}

impl Report {
    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

// =============================================================================
// Loading and selection
// =============================================================================

pub fn load_document(path: &Path) -> Result<SchemaDocument> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let doc = SchemaDocument::from_json_str(&text)
        .with_context(|| format!("failed to load schema document {}", path.display()))?;
    info!("loaded {} ({} nodes)", path.display(), doc.len());
    Ok(doc)
}

/// Definitions named by `--definition`, or all of them.
fn selected_definitions(doc: &SchemaDocument, args: &CliArgs) -> Result<Vec<NodeId>> {
    match &args.definition {
        Some(name) => match doc.definition(name) {
            Some(def) => Ok(vec![def]),
            None => bail!("no definition named `{name}`"),
        },
        None => Ok(doc.definitions().map(|(_, def)| def).collect()),
    }
}

fn reference_paths(doc: &SchemaDocument, args: &CliArgs) -> Result<Vec<DocumentPath>> {
    let mut paths: Vec<DocumentPath> = args.paths.iter().map(|p| DocumentPath::parse(p)).collect();
    if args.all {
        for def in selected_definitions(doc, args)? {
            paths.extend(collect_ref_paths(doc, def));
        }
    }
    Ok(paths)
}

/// Explicit paths that denote nodes, plus the elements of `--all` definitions.
fn member_nodes(doc: &SchemaDocument, args: &CliArgs) -> Result<Vec<NodeId>> {
    let mut nodes: Vec<NodeId> = args
        .paths
        .iter()
        .filter_map(|p| doc.node_at(&DocumentPath::parse(p)))
        .collect();
    if args.all {
        for def in selected_definitions(doc, args)? {
            nodes.push(def);
            if let Some(elements) = doc.artifact(def).elements() {
                nodes.extend(doc.entries(elements).map(|(_, member)| member));
            }
        }
    }
    Ok(nodes)
}

fn snapshot_definitions(doc: &SchemaDocument, args: &CliArgs) -> Result<Vec<NodeId>> {
    if args.definition.is_some() || args.all {
        return selected_definitions(doc, args);
    }
    let mut defs: Vec<NodeId> = Vec::new();
    for path in &args.paths {
        let owner = doc
            .node_at(&DocumentPath::parse(path))
            .and_then(|node| doc.owning_definition(node));
        if let Some(owner) = owner {
            if !defs.contains(&owner) {
                defs.push(owner);
            }
        }
    }
    Ok(defs)
}

// =============================================================================
// Inspection
// =============================================================================

/// Model errors become report entries; assertions abort.
fn recoverable(err: ResolveError, path: &str) -> Result<String> {
    if err.is_internal() {
        return Err(err).with_context(|| format!("while inspecting {path}"));
    }
    Ok(err.to_string())
}

fn member_facts(
    resolver: &Resolver<'_>,
    node: NodeId,
    args: &CliArgs,
    entry: &mut MemberReport,
) -> Result<(), ResolveError> {
    let doc = resolver.document();
    if args.origin {
        entry.origin = resolver
            .get_origin(node)?
            .map(|origin| doc.path_of(origin).to_string());
    }
    if args.effective_type {
        let ty = resolver.effective_type(node)?;
        entry.effective_type = Some(doc.path_of(ty).to_string());
    }
    Ok(())
}

pub fn inspect_document(doc: &SchemaDocument, args: &CliArgs) -> Result<Report> {
    let resolver = Resolver::with_options(
        doc,
        ResolverOptions {
            tolerate_partial: args.tolerate_partial,
        },
    );
    let mut report = Report::default();

    for path in reference_paths(doc, args)? {
        let text = path.to_string();
        debug!("inspecting {text}");
        let mut entry = ReferenceReport {
            path: text.clone(),
            ..ReferenceReport::default()
        };
        match resolver.inspect_ref(&path) {
            Ok(resolution) => entry.resolution = Some(resolution.describe(doc)),
            Err(err) => {
                entry.error = Some(recoverable(err, &text)?);
                report.errors += 1;
            }
        }
        if args.locations {
            match resolver.msg_locations(&path) {
                Ok((location, semantic)) => {
                    entry.location = location;
                    entry.semantic_location = Some(semantic);
                }
                Err(err) => {
                    let message = recoverable(err, &text)?;
                    if entry.error.is_none() {
                        entry.error = Some(message);
                        report.errors += 1;
                    }
                }
            }
        }
        report.references.push(entry);
    }

    if args.wants_members() {
        for node in member_nodes(doc, args)? {
            let path = doc.path_of(node).to_string();
            let mut entry = MemberReport {
                path: path.clone(),
                ..MemberReport::default()
            };
            if let Err(err) = member_facts(&resolver, node, args, &mut entry) {
                entry.error = Some(recoverable(err, &path)?);
                report.errors += 1;
            }
            report.members.push(entry);
        }
    }

    if args.snapshot {
        for def in snapshot_definitions(doc, args)? {
            let name = doc.definition_name(def).unwrap_or_default().to_string();
            match resolver.debug_snapshot(def) {
                Ok(snapshot) => report.snapshots.push(snapshot),
                Err(err) => {
                    let message = recoverable(err, &name)?;
                    report.snapshots.push(serde_json::json!({
                        "definition": name,
                        "error": message,
                    }));
                    report.errors += 1;
                }
            }
        }
    }

    let stats = resolver.stats();
    info!(
        "resolved {} references ({} topology builds, {} errors)",
        report.references.len(),
        stats.topology_builds,
        report.errors
    );
    Ok(report)
}

/// Load `args.input` and inspect it.
pub fn run(args: &CliArgs) -> Result<Report> {
    let doc = load_document(&args.input)?;
    inspect_document(&doc, args)
}

// =============================================================================
// Output
// =============================================================================

pub fn write_report(report: &Report, format: OutputFormat, out: &mut dyn Write) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, report)?;
            writeln!(out)?;
        }
        OutputFormat::Text => write_text(report, out)?,
    }
    Ok(())
}

fn write_text(report: &Report, out: &mut dyn Write) -> std::io::Result<()> {
    for entry in &report.references {
        match (&entry.resolution, &entry.error) {
            (_, Some(error)) => writeln!(out, "{}: error: {error}", entry.path)?,
            (Some(resolution), None) => {
                let art = resolution["art"].as_str().unwrap_or("-");
                writeln!(
                    out,
                    "{}: [{}] {} -> {art}",
                    entry.path,
                    resolution["context"].as_str().unwrap_or_default(),
                    resolution["scope"].as_str().unwrap_or_default(),
                )?;
            }
            (None, None) => writeln!(out, "{}", entry.path)?,
        }
        if let Some(semantic) = &entry.semantic_location {
            match &entry.location {
                Some(location) => writeln!(out, "  at {location} ({semantic})")?,
                None => writeln!(out, "  at {semantic}")?,
            }
        }
    }

    for entry in &report.members {
        if let Some(error) = &entry.error {
            writeln!(out, "{}: error: {error}", entry.path)?;
            continue;
        }
        writeln!(out, "{}:", entry.path)?;
        if let Some(origin) = &entry.origin {
            writeln!(out, "  origin: {origin}")?;
        }
        if let Some(ty) = &entry.effective_type {
            writeln!(out, "  effective type: {ty}")?;
        }
    }

    for snapshot in &report.snapshots {
        let text = serde_json::to_string_pretty(snapshot).map_err(std::io::Error::other)?;
        writeln!(out, "{text}")?;
    }

    if report.has_errors() {
        writeln!(out, "{} error(s)", report.errors)?;
    }
    Ok(())
}
