use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tag_gal::{config, output, pipeline, serve};

#[derive(Parser)]
#[command(name = "tag-gal")]
#[command(about = "Tag-driven gallery pages for a static photo site")]
#[command(long_about = "\
Tag-driven gallery pages for a static photo site

Every tag in use becomes a gallery page, plus one page with every photo
not tagged Exclude. The landing page gets a navigation list and preview
cards spliced between marker comments.

Project structure:

  site/
  ├── config.toml                      # Optional, see 'tag-gal gen-config'
  ├── index.html                       # Landing page with GALLERY_* markers
  ├── images/...                       # Photos
  ├── scripts/templates/gallery.html   # Page template
  └── data/
      ├── exif.json                    # exiftool -json output
      ├── captions.json                # Captions per page
      ├── gallery-meta.json            # Tag title, slug, order, cover, hidden
      └── tags/
          ├── all-tags.json            # Consolidated tags (wins when present)
          └── tags-*.json              # Per-page legacy tags

Logging goes to stderr and is controlled by RUST_LOG (e.g. RUST_LOG=debug).")]
#[command(version)]
struct Cli {
    /// Project root
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the image index, gallery pages and landing page
    Build,
    /// Resolve and render everything without writing
    Check,
    /// Run the local endpoint that saves edited captions and tags
    Serve,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Build => {
            println!("==> Building {}", cli.root.display());
            let plan = pipeline::plan_project(&cli.root)?;
            plan.write()?;
            output::print_build_output(&plan.report);
            println!("==> Build complete");
        }
        Command::Check => {
            println!("==> Checking {}", cli.root.display());
            let plan = pipeline::plan_project(&cli.root)?;
            output::print_build_output(&plan.report);
            println!("==> Project is valid (nothing written)");
        }
        Command::Serve => {
            let site_config = config::load_config(&cli.root)?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(serve::serve(&cli.root, &site_config))?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
