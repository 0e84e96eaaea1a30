use plotbox::{Sandbox, Table};
use serde_json::json;
use std::fs::File;
use std::io::Write;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "plotbox=info".to_string()))
        .with_target(false)
        .init();

    // Stand-in for a table parsed upstream from an uploaded spreadsheet.
    let table = Table::new(
        vec!["quarter".into(), "revenue".into()],
        vec![
            vec![json!("Q1"), json!(120)],
            vec![json!("Q2"), json!(150)],
            vec![json!("Q3"), json!(135)],
            vec![json!("Q4"), json!(180)],
        ],
    )?;

    let script = r#"
plt.figure(figsize=(8, 5))
plt.bar(df['quarter'], df['revenue'], color='#EBB700')
plt.title('Quarterly Revenue')
plt.ylabel('Revenue')
"#;

    let sandbox = Sandbox::new()?;
    match sandbox.render(script, Some(&table)).await {
        Ok(artifact) => {
            let mut file = File::create("revenue.png")?;
            file.write_all(artifact.as_png())?;
            println!("chart saved as 'revenue.png' ({} bytes)", artifact.len());
        }
        Err(err) => {
            println!("render failed ({:?}): {}", err.kind(), err);
        }
    }

    Ok(())
}
