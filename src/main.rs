//! svc-base - 設定ローダーとロガーのデモ

mod cli;

use anyhow::Result;

fn main() -> Result<()> {
    cli::run()
}
