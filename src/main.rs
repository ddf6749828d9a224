use anyhow::Context;
use clap::Parser;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use objfs::config;
use objfs::fs::{walk_file_tree, FileAttributes, ObjectFileSystem, ObjectPath, OpenOption, PathVisitor, VisitResult};
use objfs::utils::format_size;
use objfs::FsResult;

mod cli;

use cli::{Args, Command};

/// Prints one line per entry, indented by depth / 树形输出
struct TreePrinter {
    base: usize,
    dirs: usize,
    files: usize,
}

impl TreePrinter {
    fn new(start: &ObjectPath) -> Self {
        Self {
            base: start.names().len(),
            dirs: 0,
            files: 0,
        }
    }

    fn print(&self, path: &ObjectPath, suffix: &str) {
        let depth = path.names().len().saturating_sub(self.base);
        let name = path.file_name().unwrap_or("/");
        println!("{}{}{}", "  ".repeat(depth), name, suffix);
    }
}

impl PathVisitor for TreePrinter {
    fn pre_visit_directory(&mut self, dir: &ObjectPath, _: &FileAttributes) -> FsResult<VisitResult> {
        self.dirs += 1;
        self.print(dir, "/");
        Ok(VisitResult::Continue)
    }

    fn visit_file(&mut self, file: &ObjectPath, attributes: &FileAttributes) -> FsResult<VisitResult> {
        if attributes.is_directory() {
            self.dirs += 1;
            self.print(file, "/");
        } else {
            self.files += 1;
            self.print(file, &format!("  ({})", format_size(attributes.size)));
        }
        Ok(VisitResult::Continue)
    }
}

fn format_time(attributes: &FileAttributes) -> String {
    attributes
        .last_modified
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".repeat(19))
}

async fn run(fs: &ObjectFileSystem, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Buckets => {
            for bucket in fs.buckets() {
                let created = bucket
                    .creation_date
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{:<40} {:<20} {}", bucket.name, bucket.region, created);
            }
        }
        Command::Ls { path } => {
            let dir = fs.get_path(&path);
            for entry in fs.provider().new_directory_stream(&dir).await? {
                let kind = if entry.attributes.is_directory() { 'd' } else { '-' };
                let size = if entry.attributes.is_directory() {
                    "-".to_string()
                } else {
                    format_size(entry.attributes.size)
                };
                println!("{} {:>10} {} {}", kind, size, format_time(&entry.attributes), entry.name());
            }
        }
        Command::Tree { path, depth } => {
            let start = fs.get_path(&path);
            let mut printer = TreePrinter::new(&start);
            walk_file_tree(fs.provider(), &start, depth, &mut printer).await?;
            println!("\n{} directories, {} files", printer.dirs, printer.files);
        }
        Command::Stat { path } => {
            let path = fs.get_path(&path);
            let attributes = fs.attributes(&path).await?;
            println!("Path:     {}", path);
            println!("Type:     {}", if attributes.is_directory() { "directory" } else { "file" });
            println!("Size:     {} ({} bytes)", format_size(attributes.size), attributes.size);
            println!("Modified: {}", format_time(&attributes));
        }
        Command::Cat { path } => {
            let path = fs.get_path(&path);
            let mut reader = fs
                .provider()
                .new_byte_channel(&path, &[OpenOption::Read])
                .await?
                .into_reader()?;
            let mut stdout = tokio::io::stdout();
            tokio::io::copy(&mut reader, &mut stdout).await?;
            stdout.flush().await?;
        }
        Command::Put { local, path } => {
            let path = fs.get_path(&path);
            let mut file = tokio::fs::File::open(&local)
                .await
                .with_context(|| format!("Failed to open {:?}", local))?;
            let mut writer = fs
                .provider()
                .new_byte_channel(&path, &[OpenOption::Write, OpenOption::Create, OpenOption::TruncateExisting])
                .await?
                .into_writer()?;
            tokio::io::copy(&mut file, &mut writer).await?;
            writer.close().await?;
            println!("{} -> {} ({})", local.display(), path, format_size(writer.bytes_written()));
        }
        Command::Mkdir { path } => {
            let path = fs.get_path(&path);
            fs.provider().create_directory(&path)?;
            tracing::warn!("{} exists until this session ends; upload a file into it to keep it", path);
        }
        Command::Rm { path } => {
            let path = fs.get_path(&path);
            fs.provider().check_access(&path).await?;
            fs.provider().delete(&path).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "objfs=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    // Load configuration / 加载配置
    let config_path = args.config.clone().unwrap_or_else(config::default_config_path);
    let host = config::load_config(&config_path)?;

    let registry = objfs::default_registry();
    let fs = ObjectFileSystem::from_config(&host, &registry)
        .await
        .with_context(|| format!("Failed to connect backend '{}'", host.backend))?;

    let result = run(&fs, args.command).await;
    fs.close();
    result
}
