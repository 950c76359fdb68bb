use taskpilot::logging::init_logging;
use taskpilot::EnvConfig;
use taskpilot_cli::app::{app_from_config, backend_kind_from_env};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let config = EnvConfig::from_env()?;
    let mut app = app_from_config(&config, backend_kind_from_env())?;

    let mut stdout = tokio::io::stdout();
    write_lines(&mut stdout, app.start().await).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while !app.should_exit {
        stdout.write_all(app.prompt().as_bytes()).await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        write_lines(&mut stdout, app.on_line(&line).await).await?;
    }
    Ok(())
}

async fn write_lines(stdout: &mut tokio::io::Stdout, lines: Vec<String>) -> anyhow::Result<()> {
    for line in lines {
        stdout.write_all(line.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
    }
    stdout.flush().await?;
    Ok(())
}
