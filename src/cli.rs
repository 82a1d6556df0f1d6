use crate::session::NoIdentityPolicy;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "receipt-qr")]
#[command(about = "レシート画像をQRコード付き画像に変換・履歴管理するツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// レシート画像を読み取り、合成画像を作って履歴に保存
    Scan {
        /// レシート画像（PNG/JPEG/WEBP）
        #[arg(required = true)]
        image: PathBuf,

        /// 合成画像の出力先（デフォルト: receipt-qr.png）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 結果をこのアドレスへメール送信
        #[arg(long)]
        email: Option<String>,
    },

    /// 指定テキストでQRコード付き画像を作成（抽出・保存なし）
    Compose {
        /// レシート画像
        #[arg(required = true)]
        image: PathBuf,

        /// QRコードに埋め込むテキスト
        #[arg(short, long)]
        text: String,

        /// 出力先（デフォルト: receipt-qr.png）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 履歴の表示・管理
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// ログイン
    Login {
        /// 匿名セッションで開始
        #[arg(long)]
        anonymous: bool,
    },

    /// ログアウト
    Logout,

    /// 現在のセッションを表示
    Whoami,

    /// 設定を表示/編集
    Config {
        /// Gemini APIキーを設定
        #[arg(long)]
        set_gemini_key: Option<String>,

        /// Resend APIキーを設定
        #[arg(long)]
        set_resend_key: Option<String>,

        /// 送信元アドレスを設定
        #[arg(long)]
        set_sender: Option<String>,

        /// セッションがないときの方針
        #[arg(long, value_enum)]
        policy: Option<NoIdentityPolicy>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}

#[derive(Subcommand)]
pub enum HistoryAction {
    /// 履歴一覧（新しい順）
    List {
        /// JSONで出力
        #[arg(long)]
        json: bool,
    },

    /// 履歴をすべて削除
    Clear {
        /// 確認を省略
        #[arg(short, long)]
        yes: bool,
    },

    /// 履歴から合成画像を作り直して保存
    Export {
        /// 履歴ID
        #[arg(required = true)]
        id: String,

        /// 出力先（デフォルト: <id>.png）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 履歴の合成画像をメール送信
    Email {
        /// 履歴ID
        #[arg(required = true)]
        id: String,

        /// 宛先アドレス
        #[arg(long)]
        to: String,
    },
}
