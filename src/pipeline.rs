//! Load and query pipelines behind the binary.
//!
//! `load` reads JSON lines from a file or stdin and streams them into
//! SQLite through the batch writer. A shutdown signal ends the input, so
//! whatever has been read is still flushed before the writer completes.
//! `query` prints a table back as JSON lines through the paged row stream.

use anyhow::Context;
use futures::{future, StreamExt, TryStreamExt};
use std::path::Path;
use std::pin::pin;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::watch;
use tokio_stream::wrappers::LinesStream;

use crate::config::{Command, Config, LoadArgs, QueryArgs};
use crate::storage::{
    prepare_database, InsertBuilder, PageQuery, ReaderPool, SqliteExecutor, StoredRecord,
};
use crate::upstream::StreamPublisher;
use crate::writer::{BatchWriter, WriteSummary};

/// Upper bound on pooled write connections.
const MAX_WRITE_CONNECTIONS: u32 = 32;

/// Run the command selected on the command line.
pub async fn run(config: Config, shutdown_rx: watch::Receiver<bool>) -> anyhow::Result<()> {
    match &config.command {
        Command::Load(args) => {
            let summary = run_load(&config.db, args, shutdown_rx).await?;
            tracing::info!(
                records = summary.records,
                statements = summary.statements,
                batches = summary.batches,
                "Load finished"
            );
        }
        Command::Query(args) => {
            let mut stdout = tokio::io::stdout();
            let rows = run_query(&config.db, args, &mut stdout).await?;
            tracing::debug!(rows, "Query finished");
        }
    }
    Ok(())
}

/// Stream JSON lines from `args.input` into `args.table`.
///
/// Blank lines are skipped. A line that is not valid JSON fails the load;
/// batches already written stay written.
pub async fn run_load(
    db_path: &Path,
    args: &LoadArgs,
    shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<WriteSummary> {
    let config = args.writer_config();
    config.validate()?;

    prepare_database(db_path, &args.table)
        .with_context(|| format!("failed to prepare {}", db_path.display()))?;

    let input: Box<dyn AsyncRead + Send + Unpin> = if args.reads_stdin() {
        Box::new(tokio::io::stdin())
    } else {
        let file = tokio::fs::File::open(&args.input)
            .await
            .with_context(|| format!("failed to open {}", args.input))?;
        Box::new(file)
    };

    let lines = LinesStream::new(BufReader::new(input).lines())
        .try_filter(|line| future::ready(!line.trim().is_empty()))
        .take_until(shutdown_requested(shutdown_rx));

    let pool_size = u32::try_from(config.concurrent_requests)
        .unwrap_or(MAX_WRITE_CONNECTIONS)
        .min(MAX_WRITE_CONNECTIONS);
    let executor = SqliteExecutor::open(db_path, pool_size)?;
    let builder = InsertBuilder::new(&args.table)?;

    tracing::info!(
        db = %db_path.display(),
        table = builder.table(),
        input = %args.input,
        batch_size = config.batch_size,
        concurrent_requests = config.concurrent_requests,
        batch_type = %config.batch_type,
        "Starting load"
    );

    let handle = BatchWriter::new(builder, executor, config)
        .on_error(|e| tracing::warn!(error = %e, "Load aborted"))
        .write_stream(StreamPublisher::new(lines))?;

    Ok(handle.join().await?)
}

/// Write every row of `args.table` to `out` as one JSON object per line.
///
/// Returns the number of rows written.
pub async fn run_query<W>(db_path: &Path, args: &QueryArgs, out: &mut W) -> anyhow::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let pool = ReaderPool::new(db_path, 1)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    let query = PageQuery::new(&args.table, &StoredRecord::COLUMNS)?.with_page_size(args.page_size);
    let total = pool.count_rows(&args.table)?;
    tracing::debug!(table = %args.table, total, limit = ?args.limit, "Querying table");

    let rows = pool
        .stream_rows::<StoredRecord>(&query)
        .take(args.limit.unwrap_or(usize::MAX));
    let mut rows = pin!(rows);

    let mut written: u64 = 0;
    while let Some(row) = rows.next().await {
        let mut line = serde_json::to_vec(&row?)?;
        line.push(b'\n');
        out.write_all(&line).await?;
        written += 1;
    }
    out.flush().await?;

    Ok(written)
}

/// Resolves once shutdown is signalled. A dropped sender never signals.
async fn shutdown_requested(mut shutdown_rx: watch::Receiver<bool>) {
    loop {
        let stop = *shutdown_rx.borrow_and_update();
        if stop {
            break;
        }
        if shutdown_rx.changed().await.is_err() {
            future::pending::<()>().await;
        }
    }
    tracing::info!("Shutdown requested, closing input");
}
