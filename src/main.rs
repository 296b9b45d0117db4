// External crates

use std::collections::HashMap;
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{anyhow, ensure, Error, Result};
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use rayon::prelude::*;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use mj_io::{
    build_pbar, expand_dirs, get_output_filename, read_pathbuf_to_mem, write_mem_to_pathbuf,
};

use lshdedup::clustering::{cluster_assignments, Cluster, Clusterer};
use lshdedup::config::{from_value, parse_config, DedupConfig, IndexConfig};
use lshdedup::{MinHashStringIndex, SimHashStringIndex};

/*
Dedup Config layout:

index:
    minhash:               (or simhash:)
        jaccard_threshold: 0.8
        ...                (see config.rs for every field)
text_field: text
min_cluster_size: 2

*/
/*============================================================
=                            ARGS                            =
============================================================*/

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct ArgParser {
    #[clap(subcommand)]
    command: Commands,

    #[arg(long, default_value_t = 0)]
    threads: usize,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Annotates every document with `lsh_id` and `duplicate_of`
    #[clap(arg_required_else_help = true)]
    Dedup {
        #[arg(required = true, long)]
        input_dir: PathBuf,

        #[arg(required = true, long)]
        output_dir: PathBuf,

        #[arg(required = true, long)]
        config: PathBuf,
    },

    /// Annotates every document with `lsh_id` and `cluster_id`
    #[clap(arg_required_else_help = true)]
    Cluster {
        #[arg(required = true, long)]
        input_dir: PathBuf,

        #[arg(required = true, long)]
        output_dir: PathBuf,

        #[arg(required = true, long)]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Dedup,
    Cluster,
}

/*============================================================
=                            UTILITIES                       =
============================================================*/

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_dedup_config(config: &PathBuf, threads: usize) -> Result<DedupConfig, Error> {
    let json_config = parse_config(config)?;
    let mut dedup_config: DedupConfig = from_value(&json_config)?;
    if threads != 0 {
        match &mut dedup_config.index {
            IndexConfig::MinHash(c) => c.num_threads = threads,
            IndexConfig::SimHash(c) => c.num_threads = threads,
        }
    }
    dedup_config.index.validate()?;
    Ok(dedup_config)
}

fn read_jsonl(path: &PathBuf) -> Result<Vec<Value>, Error> {
    let data = read_pathbuf_to_mem(path)?;
    let mut docs: Vec<Value> = Vec::new();
    for (line_num, line) in data.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line)
            .map_err(|e| anyhow!("{:?} line {}: {}", path, line_num + 1, e))?;
        docs.push(value);
    }
    Ok(docs)
}

fn write_output_lines(output_values: &[Value], output_file: &PathBuf) -> Result<(), Error> {
    let mut output_bytes: Vec<u8> = Vec::new();
    for v in output_values {
        output_bytes.extend(serde_json::to_vec(v)?);
        output_bytes.push(b'\n');
    }
    write_mem_to_pathbuf(&output_bytes, output_file)
}

/// Every input file in path order, with the first global id of each.
struct Corpus {
    files: Vec<PathBuf>,
    docs: Vec<Vec<Value>>,
    offsets: Vec<i64>,
}

impl Corpus {
    fn load(files: Vec<PathBuf>, pbar: &ProgressBar) -> Result<Self, Error> {
        let docs = files
            .par_iter()
            .map(|p| {
                let docs = read_jsonl(p);
                pbar.inc(1);
                docs
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let mut offsets = Vec::with_capacity(docs.len());
        let mut next_id: i64 = 0;
        for file_docs in &docs {
            offsets.push(next_id);
            next_id += file_docs.len() as i64;
        }
        Ok(Corpus {
            files,
            docs,
            offsets,
        })
    }

    fn num_docs(&self) -> usize {
        self.docs.iter().map(|d| d.len()).sum()
    }

    /// `(id, text)` for every document carrying a string `text_field`.
    fn texts<'a>(&'a self, text_field: &str) -> (Vec<i64>, Vec<&'a str>) {
        let mut ids = Vec::new();
        let mut texts = Vec::new();
        for (file_docs, offset) in self.docs.iter().zip(self.offsets.iter()) {
            for (i, doc) in file_docs.iter().enumerate() {
                if let Some(text) = doc.get(text_field).and_then(|t| t.as_str()) {
                    ids.push(offset + i as i64);
                    texts.push(text);
                }
            }
        }
        (ids, texts)
    }
}

enum DedupIndex {
    MinHash(MinHashStringIndex),
    SimHash(SimHashStringIndex),
}

impl DedupIndex {
    fn build(config: &IndexConfig) -> Result<Self, Error> {
        Ok(match config {
            IndexConfig::MinHash(c) => DedupIndex::MinHash(MinHashStringIndex::new(c.clone())?),
            IndexConfig::SimHash(c) => DedupIndex::SimHash(SimHashStringIndex::new(c.clone())?),
        })
    }

    fn bulk_insert(&mut self, ids: &[i64], texts: &[&str]) -> Result<(), Error> {
        match self {
            DedupIndex::MinHash(index) => index.bulk_insert(ids, texts)?,
            DedupIndex::SimHash(index) => index.bulk_insert(ids, texts)?,
        }
        Ok(())
    }

    fn bulk_query(&self, texts: &[&str]) -> Result<Vec<Vec<i64>>, Error> {
        Ok(match self {
            DedupIndex::MinHash(index) => index.bulk_query(texts)?,
            DedupIndex::SimHash(index) => index.bulk_query(texts)?,
        })
    }

    fn clusters(&self, min_cluster_size: usize) -> Vec<Cluster<i64>> {
        let clusterer = Clusterer::new(min_cluster_size);
        match self {
            DedupIndex::MinHash(index) => clusterer.cluster(index),
            DedupIndex::SimHash(index) => clusterer.cluster(index),
        }
    }

    fn describe(&self) -> String {
        match self {
            DedupIndex::MinHash(index) => index.to_string(),
            DedupIndex::SimHash(index) => index.to_string(),
        }
    }
}

/// Smallest neighbour id below `id`, if any.
fn duplicate_of(id: i64, hits: &[i64]) -> Option<i64> {
    hits.iter().copied().filter(|h| *h < id).min()
}

/*============================================================
=                            DEDUP / CLUSTER                 =
============================================================*/

fn lsh_annotate(
    input_dir: &PathBuf,
    output_dir: &PathBuf,
    config: &PathBuf,
    threads: usize,
    mode: Mode,
) -> Result<(), Error> {
    /* Near-duplicate annotation over a directory of jsonl files.

    Every document gets a global id (files in sorted path order, lines in order). Documents
    with a string text_field are indexed, then each file is rewritten into output_dir with
    the annotation for the chosen mode added.
    */
    let start_main = Instant::now();
    let dedup_config = load_dedup_config(config, threads)?;

    // Read everything
    let mut all_files = expand_dirs(vec![input_dir.clone()], None)?;
    ensure!(!all_files.is_empty(), "No input files found in {:?}", input_dir);
    all_files.sort();
    let pbar = build_pbar(all_files.len(), "Reading");
    let corpus = Corpus::load(all_files, &pbar)?;
    pbar.finish();
    let (ids, texts) = corpus.texts(&dedup_config.text_field);

    // Index everything
    let start_index = Instant::now();
    let mut index = DedupIndex::build(&dedup_config.index)?;
    index.bulk_insert(&ids, &texts)?;
    let index_secs = start_index.elapsed().as_secs_f64();

    // Compute annotations
    let start_query = Instant::now();
    let (key, annotations): (&str, HashMap<i64, i64>) = match mode {
        Mode::Dedup => {
            let hits = index.bulk_query(&texts)?;
            let dups = ids
                .iter()
                .zip(hits.iter())
                .filter_map(|(id, h)| duplicate_of(*id, h).map(|d| (*id, d)))
                .collect();
            ("duplicate_of", dups)
        }
        Mode::Cluster => {
            let clusters = index.clusters(dedup_config.min_cluster_size);
            let assignments = cluster_assignments(&clusters)
                .into_iter()
                .map(|(id, c)| (id, c as i64))
                .collect();
            ("cluster_id", assignments)
        }
    };
    let query_secs = start_query.elapsed().as_secs_f64();

    // Write everything
    let pbar = build_pbar(corpus.files.len(), "Writing");
    corpus
        .files
        .par_iter()
        .zip(corpus.docs.par_iter())
        .zip(corpus.offsets.par_iter())
        .map(|((path, docs), offset)| {
            let output_file = get_output_filename(path, input_dir, output_dir)?;
            let annotated: Vec<Value> = docs
                .iter()
                .enumerate()
                .map(|(i, doc)| {
                    let id = offset + i as i64;
                    let mut doc = doc.clone();
                    if let Some(obj) = doc.as_object_mut() {
                        obj.insert(String::from("lsh_id"), json!(id));
                        obj.insert(key.to_string(), json!(annotations.get(&id)));
                    }
                    doc
                })
                .collect();
            write_output_lines(&annotated, &output_file)?;
            pbar.inc(1);
            Ok(())
        })
        .collect::<Result<Vec<()>, Error>>()?;
    pbar.finish();

    print_stats(
        start_main,
        &index,
        corpus.num_docs(),
        ids.len(),
        index_secs,
        query_secs,
        mode,
        &annotations,
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn print_stats(
    start_time: Instant,
    index: &DedupIndex,
    total_docs: usize,
    indexed_docs: usize,
    index_secs: f64,
    query_secs: f64,
    mode: Mode,
    annotations: &HashMap<i64, i64>,
) {
    let pct = |n: usize| n as f64 / f64::max(1.0, total_docs as f64) * 100.0;

    println!("Finishing {:?} in {:?} seconds", mode, start_time.elapsed().as_secs());
    println!("Processed {:?} total documents", total_docs);
    println!("-------------------------------------------");
    println!("{}", index.describe());
    println!("\t Indexed {:?} docs in {:.2}s", indexed_docs, index_secs);
    println!("\t Skipped {:?} docs without text", total_docs - indexed_docs);
    match mode {
        Mode::Dedup => {
            let dups = annotations.len();
            println!("\t Queried in {:.2}s", query_secs);
            println!("FINAL:");
            println!("\t {:?} docs are duplicates | {:.2}% of pool", dups, pct(dups));
            println!(
                "\t {:?} docs survive dedup | {:.2}% of pool",
                total_docs - dups,
                pct(total_docs - dups)
            );
        }
        Mode::Cluster => {
            let num_clusters = annotations.values().collect::<std::collections::HashSet<_>>().len();
            let clustered = annotations.len();
            println!("\t Clustered in {:.2}s", query_secs);
            println!("FINAL:");
            println!("\t {:?} clusters", num_clusters);
            println!("\t {:?} docs in a cluster | {:.2}% of pool", clustered, pct(clustered));
        }
    }
}

/*============================================================
=                            MAIN                            =
============================================================*/

fn main() -> Result<(), Error> {
    let args = ArgParser::parse();
    init_logging();
    let threads = args.threads;
    // The global rayon pool only reads and writes files. Index work runs on the
    // index's own pool, which load_dedup_config sizes from the same flag.
    if threads != 0 {
        std::env::set_var("RAYON_NUM_THREADS", threads.to_string());
    }

    match &args.command {
        Commands::Dedup {
            input_dir,
            output_dir,
            config,
        } => lsh_annotate(input_dir, output_dir, config, threads, Mode::Dedup),
        Commands::Cluster {
            input_dir,
            output_dir,
            config,
        } => lsh_annotate(input_dir, output_dir, config, threads, Mode::Cluster),
    }
}
