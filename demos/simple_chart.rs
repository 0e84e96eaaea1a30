use plotbox::Sandbox;
use std::fs::File;
use std::io::Write;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "plotbox=info".to_string()))
        .with_target(false)
        .init();

    // The kind of script the upstream model produces for a chart request.
    let script = r#"
import numpy as np

x = np.linspace(0, 2 * np.pi, 100)
plt.figure(figsize=(8, 6))
plt.plot(x, np.sin(x), label='Sine Wave', color='#981E5B')
plt.title('Simple Sine Wave')
plt.xlabel('X')
plt.ylabel('Y')
plt.legend()
plt.grid(True)
"#;

    let sandbox = Sandbox::new()?;
    match sandbox.render(script, None).await {
        Ok(artifact) => {
            let mut file = File::create("sine_wave.png")?;
            file.write_all(artifact.as_png())?;
            println!("chart saved as 'sine_wave.png' ({} bytes)", artifact.len());
        }
        Err(err) => {
            println!("render failed ({:?}): {}", err.kind(), err);
        }
    }

    Ok(())
}
