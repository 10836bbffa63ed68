use std::fs;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use base64::Engine as _;
use chrono::Utc;
use engine_logging::{engine_info, engine_warn};
use lotgrab_core::{sanitize_folder_name, LotRecord, PlanOptions, SessionState};
use lotgrab_engine::{
    build_plan, ensure_output_dir, is_dashboard_url, run_session, scrape_dashboard,
    ConvertRequest, ConvertResponse, DirectoryDiscovery, FetchSettings, Fetcher, ImageConverter,
    PlanError, ReqwestDownloadService, ReqwestFetcher, ScrapeError, SessionReport,
    DEFAULT_AUCTION_NAME,
};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use super::cli::{ConvertArgs, DownloadArgs};
use super::persistence::{save_config, AppConfig};
use super::render::{rejection_text, ProgressPrinter};

const EXIT_ABORTED: u8 = 130;

pub async fn run_download(args: DownloadArgs, mut config: AppConfig, config_path: &Path) -> Result<ExitCode> {
    let options = effective_options(&args, &config.options);
    let output_dir = args.output.clone().unwrap_or_else(|| config.output_dir.clone());
    ensure_output_dir(&output_dir)
        .with_context(|| format!("cannot use output directory {}", output_dir.display()))?;

    let abort = CancellationToken::new();
    abort_on_ctrl_c(abort.clone());

    let (auction_name, lots) = load_lots(&args).await?;
    let folder = sanitize_folder_name(args.folder.as_deref().unwrap_or(&auction_name));
    println!("Found {} lots; saving into \"{}\"", lots.len(), folder);

    let mut discovery = DirectoryDiscovery::new(ReqwestFetcher::new(FetchSettings::default()));
    let plan = match build_plan(&lots, &folder, &options, Some(&mut discovery), &abort).await {
        Ok(plan) => plan,
        Err(PlanError::Cancelled) => {
            println!("Operation aborted.");
            return Ok(ExitCode::from(EXIT_ABORTED));
        }
        Err(err) => {
            println!("{err}");
            return Ok(ExitCode::FAILURE);
        }
    };
    engine_info!("Planned {} downloads for {} lots", plan.len(), lots.len());

    let service =
        ReqwestDownloadService::new(output_dir.clone(), &FetchSettings::for_images(), Handle::current())
            .context("cannot start the download service")?;
    let mut printer = ProgressPrinter::default();
    let report = run_session(&service, plan, &abort, &mut printer).await;

    config.options = options;
    config.output_dir = output_dir;
    config.last_folder = Some(folder);
    config.last_run_utc = Some(Utc::now().to_rfc3339());
    save_config(config_path, &config);

    Ok(exit_code(&report))
}

pub async fn run_convert(args: ConvertArgs) -> Result<ExitCode> {
    let fetcher: Arc<dyn Fetcher> = Arc::new(ReqwestFetcher::new(FetchSettings::for_images()));
    let converter = ImageConverter::new(fetcher);
    let response = converter
        .convert(ConvertRequest {
            url: args.url.clone(),
            format: args.format.into(),
        })
        .await;
    converter.close();

    let data_url = match response {
        ConvertResponse::Success { data_url } => data_url,
        ConvertResponse::Failure { error } => {
            eprintln!("{error}");
            return Ok(ExitCode::FAILURE);
        }
    };
    match &args.out {
        Some(path) => {
            let bytes = decode_data_url(&data_url)?;
            fs::write(path, bytes).with_context(|| format!("cannot write {}", path.display()))?;
            println!("Saved {}", path.display());
        }
        None => println!("{data_url}"),
    }
    Ok(ExitCode::SUCCESS)
}

/// Command-line values win; anything not given comes from the saved settings.
fn effective_options(args: &DownloadArgs, saved: &PlanOptions) -> PlanOptions {
    PlanOptions {
        skip_pending: args.skip_pending.unwrap_or(saved.skip_pending),
        use_subfolders: args.subfolders.unwrap_or(saved.use_subfolders),
        discover_all_images: args.all_images.unwrap_or(saved.discover_all_images),
    }
}

async fn load_lots(args: &DownloadArgs) -> Result<(String, Vec<LotRecord>)> {
    if let Some(path) = &args.lots {
        let text = fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
        let lots: Vec<LotRecord> =
            serde_json::from_str(&text).with_context(|| format!("{} is not a lot list", path.display()))?;
        return Ok((DEFAULT_AUCTION_NAME.to_string(), lots));
    }

    let Some(page) = args.page.as_deref() else {
        bail!("a dashboard page or --lots file is required");
    };
    let result = if page.starts_with("http://") || page.starts_with("https://") {
        if !args.allow_any_page && !is_dashboard_url(page) {
            return Err(ScrapeError::NotADashboard(page.to_string()).into());
        }
        let output = ReqwestFetcher::new(FetchSettings::default())
            .fetch(page)
            .await
            .with_context(|| format!("cannot load {page}"))?;
        scrape_dashboard(&output.text()?, Some(&output.metadata.final_url))?
    } else {
        let html = fs::read_to_string(page).with_context(|| format!("cannot read {page}"))?;
        scrape_dashboard(&html, None)?
    };
    Ok((result.auction_name, result.lots))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Abort,
    ForceQuit,
}

/// First Ctrl-C aborts the run; another one while cancellations settle quits.
fn on_interrupt(abort: &CancellationToken) -> Interrupt {
    if abort.is_cancelled() {
        Interrupt::ForceQuit
    } else {
        abort.cancel();
        Interrupt::Abort
    }
}

fn abort_on_ctrl_c(abort: CancellationToken) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            match on_interrupt(&abort) {
                Interrupt::Abort => {
                    engine_warn!("Interrupted by user");
                    eprintln!("Aborting... press Ctrl-C again to quit immediately.");
                }
                Interrupt::ForceQuit => {
                    engine_warn!("Second interrupt, quitting without waiting for cancellations");
                    log::logger().flush();
                    std::process::exit(i32::from(EXIT_ABORTED));
                }
            }
        }
    });
}

fn exit_code(report: &SessionReport) -> ExitCode {
    match report.view.session {
        SessionState::Completed if report.view.failed == 0 => ExitCode::SUCCESS,
        SessionState::Aborted => ExitCode::from(EXIT_ABORTED),
        SessionState::Idle => {
            if let Some(reason) = report.view.last_rejection {
                println!("{}", rejection_text(reason));
            }
            ExitCode::FAILURE
        }
        _ => ExitCode::FAILURE,
    }
}

fn decode_data_url(data_url: &str) -> Result<Vec<u8>> {
    let (_, payload) = data_url
        .split_once(";base64,")
        .context("converter returned an unexpected data URL")?;
    Ok(base64::engine::general_purpose::STANDARD.decode(payload)?)
}
