// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Land Annotation Developers. All Rights Reserved.

use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use land_annotation::{
    AnnotationRecord, Error, FileBlobStore, Fingerprint, GeoCoordinate, PersistenceCodec,
    PersistentStore, Settings,
};
use log::{debug, info};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

type Store = PersistentStore<PersistenceCodec<FileBlobStore>>;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file (TOML).  Defaults to config.toml in the platform config
    /// directory when present.
    #[clap(long)]
    config: Option<PathBuf>,

    /// Directory holding the saved annotations
    #[clap(long, env = "LAND_ANNOTATION_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Annotation Command
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum Command {
    /// Annotate photos and add them to the store.  Directories are searched
    /// recursively for JPEG files.
    Add {
        /// Photo files or directories
        #[clap(required = true)]
        paths: Vec<PathBuf>,

        /// Comment stored in the photo
        #[clap(long, short)]
        comment: Option<String>,

        /// Location as "latitude,longitude" in decimal degrees
        #[clap(long, short)]
        location: Option<GeoCoordinate>,

        /// Title stored in the photo
        #[clap(long)]
        title: Option<String>,

        /// Capture time (RFC 3339), replacing the time recorded in the photo
        #[clap(long)]
        captured_at: Option<DateTime<Utc>>,
    },
    /// List stored annotations in display order.
    List,
    /// Show the details of an annotation.
    Show {
        /// Annotation fingerprint
        fingerprint: Fingerprint,
    },
    /// Delete an annotation.
    Delete {
        /// Annotation fingerprint
        fingerprint: Fingerprint,
    },
    /// Write every annotation to a portable export document.  The document is
    /// written to stdout unless an output file is provided.
    Export {
        /// Output file
        output: Option<PathBuf>,
    },
    /// Merge an export document into the store.  Annotations already present
    /// are skipped.
    Import {
        /// Export document
        input: PathBuf,
    },
    /// Write the annotated photo of an annotation to a file.
    Extract {
        /// Annotation fingerprint
        fingerprint: Fingerprint,

        /// Output image file
        output: PathBuf,
    },
}

fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| matches!(ext.to_lowercase().as_str(), "jpg" | "jpeg"))
}

fn collect_photos(paths: &[PathBuf]) -> Result<Vec<PathBuf>, Error> {
    let mut photos = Vec::new();
    for path in paths {
        if !path.is_dir() {
            photos.push(path.clone());
            continue;
        }
        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                Error::InvalidParameters(format!("Cannot read {}: {}", path.display(), e))
            })?;
            if entry.file_type().is_file() && is_jpeg(entry.path()) {
                photos.push(entry.into_path());
            }
        }
    }
    debug!("Found {} photos", photos.len());
    Ok(photos)
}

fn find_record<'a>(
    store: &'a Store,
    fingerprint: &Fingerprint,
) -> Result<&'a AnnotationRecord, Error> {
    store
        .store()
        .get(fingerprint)
        .ok_or_else(|| Error::InvalidParameters(format!("No annotation {}", fingerprint)))
}

fn format_location(record: &AnnotationRecord) -> String {
    if record.has_location() {
        record.location().to_string()
    } else {
        "-".to_string()
    }
}

async fn handle_add(
    store: &mut Store,
    paths: Vec<PathBuf>,
    comment: Option<String>,
    location: Option<GeoCoordinate>,
    title: Option<String>,
    captured_at: Option<DateTime<Utc>>,
) -> Result<(), Error> {
    if let Some(location) = &location {
        location.validate()?;
    }

    for path in collect_photos(&paths)? {
        let mut record = AnnotationRecord::from_file(&path).await?;
        if let Some(comment) = &comment {
            record.set_comment(comment.as_str());
        }
        if let Some(location) = location {
            record.set_location(location);
        }
        if title.is_some() {
            record.set_title(title.clone());
        }
        if let Some(captured_at) = captured_at {
            record.set_captured_at(captured_at);
        }
        record.commit()?;

        let fingerprint = record.fingerprint().clone();
        store.add_event(record).await?;
        println!("{}\t{}", fingerprint, path.display());
    }
    Ok(())
}

fn handle_list(store: &Store) -> Result<(), Error> {
    for record in store.records() {
        println!(
            "{}\t{}\t{}\t{}",
            record.fingerprint(),
            record
                .captured_at()
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            format_location(record),
            record.comment()
        );
    }
    Ok(())
}

fn handle_show(store: &Store, fingerprint: Fingerprint) -> Result<(), Error> {
    let record = find_record(store, &fingerprint)?;
    println!("Fingerprint: {}", record.fingerprint());
    println!("Comment: {}", record.comment());
    println!("Title: {}", record.title().unwrap_or("-"));
    println!("Location: {}", format_location(record));
    println!(
        "Captured: {}",
        record
            .captured_at()
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    println!("Size: {} bytes", record.bytes().len());
    Ok(())
}

async fn handle_delete(store: &mut Store, fingerprint: Fingerprint) -> Result<(), Error> {
    match store.delete(&fingerprint).await? {
        Some(_) => {
            println!("Deleted {}", fingerprint);
            Ok(())
        }
        None => Err(Error::InvalidParameters(format!(
            "No annotation {}",
            fingerprint
        ))),
    }
}

async fn handle_export(store: &Store, output: Option<PathBuf>) -> Result<(), Error> {
    let json = serde_json::to_string_pretty(&store.export())?;
    match output {
        Some(output) => {
            tokio::fs::write(&output, json).await?;
            info!(
                "Exported {} annotations to {:?}",
                store.records().len(),
                output
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

async fn handle_import(store: &mut Store, input: PathBuf) -> Result<(), Error> {
    let json = tokio::fs::read_to_string(&input).await?;
    let summary = store.import(&json).await?;
    println!(
        "Imported {} annotations, {} already present",
        summary.added, summary.skipped
    );
    Ok(())
}

async fn handle_extract(
    store: &Store,
    fingerprint: Fingerprint,
    output: PathBuf,
) -> Result<(), Error> {
    let record = find_record(store, &fingerprint)?;
    tokio::fs::write(&output, record.bytes()).await?;
    println!("Wrote {}", output.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref())?;
    let data_dir = args.data_dir.unwrap_or(settings.data_dir);
    debug!("Using data directory {:?}", data_dir);

    let codec = PersistenceCodec::new(FileBlobStore::with_path(data_dir))
        .with_index_key(settings.index_key);
    let mut store = PersistentStore::open(codec).await?;

    match args.cmd {
        Command::Add {
            paths,
            comment,
            location,
            title,
            captured_at,
        } => handle_add(&mut store, paths, comment, location, title, captured_at).await,
        Command::List => handle_list(&store),
        Command::Show { fingerprint } => handle_show(&store, fingerprint),
        Command::Delete { fingerprint } => handle_delete(&mut store, fingerprint).await,
        Command::Export { output } => handle_export(&store, output).await,
        Command::Import { input } => handle_import(&mut store, input).await,
        Command::Extract {
            fingerprint,
            output,
        } => handle_extract(&store, fingerprint, output).await,
    }
}
