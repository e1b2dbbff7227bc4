use crate::cli::BroadenArgs;
use crate::error::{CliError, Result};
use crate::profile::Profile;
use fitgraph::core::convolution::ZeroSumPolicy;
use fitgraph::core::value::Value;
use fitgraph::engine::config::{GraphConfig, GraphConfigBuilder};
use fitgraph::engine::graph::Graph;
use tracing::{debug, info};

pub fn run(args: BroadenArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    debug!("Resolved graph configuration: {:?}", config);

    info!("Loading profile from {:?}", &args.profile);
    let profile = Profile::read(&args.profile)?;
    info!("Loading kernel from {:?}", &args.kernel);
    let kernel = Profile::read(&args.kernel)?;

    let broadened = broaden(&profile, &kernel, config)?;

    info!("Writing broadened profile to {:?}", &args.output);
    broadened.write(&args.output)?;
    println!(
        "Broadened {} samples with a {}-sample kernel.",
        broadened.y.len(),
        kernel.y.len()
    );
    Ok(())
}

fn resolve_config(args: &BroadenArgs) -> Result<GraphConfig> {
    let file_config = match &args.config {
        Some(path) => {
            info!("Loading graph configuration from {:?}", path);
            GraphConfig::load(path)?
        }
        None => GraphConfig::default(),
    };

    let policy = args
        .zero_sum_policy
        .map_or(file_config.zero_sum_policy, ZeroSumPolicy::from);
    Ok(GraphConfigBuilder::new().zero_sum_policy(policy).build())
}

/// Evaluates `convolve(profile, kernel)` through an expression graph.
fn broaden(profile: &Profile, kernel: &Profile, config: GraphConfig) -> Result<Profile> {
    let mut graph = Graph::with_config(config);
    let signal = graph.add_argument(Some("profile"), Some(Value::from(profile.y.clone())));
    let resolution = graph.add_argument(Some("kernel"), Some(Value::from(kernel.y.clone())));
    let convolution = graph.add_convolution_operator(Some("broadened"));
    graph.add_literal(convolution, signal)?;
    graph.add_literal(convolution, resolution)?;

    let y = match graph.value(convolution)? {
        Value::Array(samples) => samples.iter().copied().collect(),
        Value::Scalar(v) => vec![*v],
    };
    if y.len() != profile.y.len() {
        return Err(CliError::Other(anyhow::anyhow!(
            "broadened profile has {} samples, expected {}",
            y.len(),
            profile.y.len()
        )));
    }

    Ok(Profile {
        x: profile.x.clone(),
        y,
    })
}
