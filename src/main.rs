use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use receipt_qr::cli::{Cli, Commands, HistoryAction};
use receipt_qr::config::Config;
use receipt_qr::context::AppContext;
use receipt_qr::error::{ReceiptQrError, Result};
use receipt_qr::intake::{self, ImageSource};
use receipt_qr::pipeline::{self, PipelineStage};
use receipt_qr_common::SessionIdentity;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const DEFAULT_OUTPUT: &str = "receipt-qr.png";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{}", e.notification());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    init_logging(cli.verbose, &config.log_level);

    match cli.command {
        Commands::Scan { image, output, email } => {
            println!("🧾 receipt-qr - レシート読み取り\n");

            let mut ctx = AppContext::open(config)?;
            ctx.start().await;
            print_identity(&ctx.session.identity());

            let spinner = spinner();
            let progress = spinner.clone();
            let mut pipeline = ctx.pipeline()?.with_observer(Box::new(move |stage: PipelineStage| {
                let message = match stage {
                    PipelineStage::Extracting => "[1/2] テキストを抽出中...",
                    PipelineStage::Composing => "[2/2] 画像を合成中...",
                    _ => return,
                };
                progress.set_message(message);
            }));

            let result = pipeline.run(ImageSource::Path(image)).await;
            spinner.finish_and_clear();
            let outcome = result?;

            println!("✔ 抽出テキスト:\n{}\n", outcome.record.extracted_text);

            let output = output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
            outcome.composite.save(&output)?;
            println!(
                "✔ 合成画像を保存: {} ({}x{})",
                output.display(),
                outcome.composite.width(),
                outcome.composite.height()
            );
            println!("✔ 履歴に保存: {}", outcome.record.id);

            if let Some(to) = email {
                let mailer = ctx.mailer()?;
                pipeline.email_result(&mailer, &to).await?;
                println!("✔ メールを送信: {}", to);
            }

            println!("\n✅ 完了");
        }

        Commands::Compose { image, text, output } => {
            let ctx = AppContext::open(config)?;
            let receipt = intake::read_as_data_uri(&ImageSource::Path(image))?;
            let composite = ctx.compositor.compose(&receipt, &text)?;

            let output = output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
            composite.save(&output)?;
            println!("✔ 合成画像を保存: {} ({}x{})", output.display(), composite.width(), composite.height());
        }

        Commands::History { action } => {
            let mut ctx = AppContext::open(config)?;
            ctx.start().await;
            if ctx.history.owner().is_none() {
                return Err(ReceiptQrError::NotAuthenticated);
            }
            if let Some(err) = ctx.history.last_error() {
                return Err(ReceiptQrError::Persistence(err));
            }

            match action {
                HistoryAction::List { json } => {
                    let records = ctx.history.list();
                    if json {
                        println!("{}", serde_json::to_string_pretty(&records)?);
                    } else if records.is_empty() {
                        println!("履歴はありません");
                    } else {
                        println!("履歴（{}件）:", records.len());
                        for record in &records {
                            println!("  {}  {}  {}", record.id, format_timestamp(record.timestamp), summary(&record.extracted_text));
                        }
                    }
                }

                HistoryAction::Clear { yes } => {
                    let confirmed = yes
                        || dialoguer::Confirm::new()
                            .with_prompt(format!("履歴{}件をすべて削除しますか？", ctx.history.len()))
                            .default(false)
                            .interact()
                            .map_err(|e| ReceiptQrError::Config(format!("入力を取得できません: {}", e)))?;
                    if !confirmed {
                        println!("中止しました");
                        return Ok(());
                    }
                    ctx.history.clear().await?;
                    println!("✔ 履歴を削除しました");
                }

                HistoryAction::Export { id, output } => {
                    let record = ctx.history.get(&id).ok_or_else(|| ReceiptQrError::RecordNotFound(id.clone()))?;
                    let composite = ctx.compositor.compose(&record.receipt_image_uri, &record.extracted_text)?;
                    let output = output.unwrap_or_else(|| PathBuf::from(format!("{}.png", id)));
                    composite.save(&output)?;
                    println!("✔ 合成画像を保存: {}", output.display());
                }

                HistoryAction::Email { id, to } => {
                    let record = ctx.history.get(&id).ok_or_else(|| ReceiptQrError::RecordNotFound(id.clone()))?;
                    let mailer = ctx.mailer()?;
                    pipeline::send_receipt_email(
                        &ctx.compositor,
                        &mailer,
                        ctx.config.request_timeout(),
                        &record.receipt_image_uri,
                        &record.extracted_text,
                        &to,
                    )
                    .await?;
                    println!("✔ メールを送信: {}", to);
                }
            }
        }

        Commands::Login { anonymous } => {
            let ctx = AppContext::open(config)?;
            let identity = if anonymous {
                ctx.session.sign_in_anonymous().await?
            } else {
                ctx.session.sign_in_interactive().await?
            };
            print_identity(&identity);
        }

        Commands::Logout => {
            let ctx = AppContext::open(config)?;
            ctx.session.sign_out().await?;
            println!("✔ ログアウトしました");
        }

        Commands::Whoami => {
            let ctx = AppContext::open(config)?;
            print_identity(&ctx.session.identity());
        }

        Commands::Config { set_gemini_key, set_resend_key, set_sender, policy, show } => {
            let mut config = config;

            if let Some(key) = set_gemini_key {
                config.set_gemini_api_key(key)?;
                println!("✔ Gemini APIキーを設定しました");
            }

            if let Some(key) = set_resend_key {
                config.set_resend_api_key(key)?;
                println!("✔ Resend APIキーを設定しました");
            }

            if let Some(sender) = set_sender {
                config.set_sender(sender)?;
                println!("✔ 送信元アドレスを設定しました");
            }

            if let Some(policy) = policy {
                config.set_policy(policy)?;
                println!("✔ セッション方針を設定しました: {}", policy);
            }

            if show {
                println!("設定:");
                println!("  モデル: {}", config.model);
                println!("  最大画像サイズ: {}px", config.max_image_size);
                println!("  タイムアウト: {}秒", config.timeout_seconds);
                println!("  セッション方針: {}", config.no_identity_policy);
                println!("  送信元: {}", config.sender());
                println!("  Gemini APIキー: {}", if config.get_gemini_api_key().is_ok() { "設定済み" } else { "未設定" });
                println!("  Resend APIキー: {}", if config.get_resend_api_key().is_ok() { "設定済み" } else { "未設定" });
                if let Ok(dir) = config.data_dir() {
                    println!("  データ: {}", dir.display());
                }
            }
        }
    }

    Ok(())
}

/// RUST_LOG > --verbose > 設定ファイル の順で決める
fn init_logging(verbose: bool, configured: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { configured };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn spinner() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(style);
    }
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

fn print_identity(identity: &SessionIdentity) {
    match identity.owner_id() {
        Some(owner) => println!("セッション: {} ({})", identity.label(), owner),
        None => println!("セッション: {}", identity.label()),
    }
}

fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| millis.to_string())
}

/// 一覧表示用に1行目を短くする
fn summary(text: &str) -> String {
    let first = text.lines().next().unwrap_or_default();
    let mut s: String = first.chars().take(40).collect();
    if first.chars().count() > 40 || text.lines().nth(1).is_some() {
        s.push('…');
    }
    s
}
