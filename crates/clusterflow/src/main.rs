use anyhow::Context;
use clap::Parser;
use clusterflow_cloud_aws::Ec2Provider;
use clusterflow_config::{Credentials, find_deploy_dir};
use clusterflow_core::{
    Action, AssumeYes, ClusterOptions, CodeSource, Confirm, LaunchOptions, LifecycleController,
    Outcome, SshShell, StdinConfirm,
};
use colored::Colorize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "clusterflow", version)]
#[command(
    about = "Launch and manage compute clusters on EC2",
    long_about = "Launch and manage compute clusters on EC2.\n\n\
        Actions: launch, destroy, login, get-master, stop, start"
)]
struct Cli {
    /// launch, destroy, login, get-master, stop or start
    action: String,

    /// Name of the cluster; its security groups are <name>-master, -slaves and -zoo
    cluster_name: String,

    /// Number of slaves to launch
    #[arg(short, long, default_value_t = 1)]
    slaves: u32,

    /// Key pair to use on instances
    #[arg(short, long)]
    key_pair: Option<String>,

    /// SSH private key file to use for logging into instances
    #[arg(short, long, env = "CLUSTERFLOW_IDENTITY_FILE")]
    identity_file: Option<PathBuf>,

    /// Type of instance to launch
    #[arg(short = 't', long, default_value = "m1.large")]
    instance_type: String,

    /// Master instance type (leave out for same as instance type)
    #[arg(short, long)]
    master_instance_type: Option<String>,

    /// Availability zone to launch instances in
    #[arg(short, long, default_value = "us-east-1b")]
    zone: String,

    /// Machine image ID to use
    #[arg(short, long, default_value = "ami-f8806a91")]
    ami: String,

    /// OS on the image; selects the deploy.<os> template directory
    #[arg(short, long, default_value = "lucid64")]
    os: String,

    /// Where to download the framework from (git or none)
    #[arg(short, long, default_value = "none")]
    download: String,

    /// If using git, which branch to check out
    #[arg(short, long, default_value = "master")]
    branch: String,

    /// Use SSH dynamic port forwarding to create a SOCKS proxy at the given
    /// local address (for use with login)
    #[arg(short = 'D', value_name = "[ADDRESS:]PORT")]
    proxy_port: Option<String>,

    /// Resume installation on a previously launched cluster (for debugging)
    #[arg(long)]
    resume: bool,

    /// Number of masters to run; above 1 also launches a ZooKeeper quorum
    #[arg(short = 'f', long = "ft", default_value_t = 1)]
    fault_tolerance: u32,

    /// Attach a new EBS volume of this size (in GB) to each node as /dev/sdv
    #[arg(long, default_value_t = 0)]
    ebs_vol_size: u32,

    /// Do not ask for confirmation before destroy or stop
    #[arg(short, long)]
    yes: bool,

    /// Verbose output (debug logs)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn cluster_options(&self) -> anyhow::Result<ClusterOptions> {
        let download: CodeSource = self.download.parse()?;

        Ok(ClusterOptions {
            launch: LaunchOptions {
                slaves: self.slaves,
                fault_tolerance: self.fault_tolerance,
                key_pair: self.key_pair.clone(),
                instance_type: self.instance_type.clone(),
                master_instance_type: self.master_instance_type.clone(),
                zone: self.zone.clone(),
                image_id: self.ami.clone(),
                ebs_vol_size: self.ebs_vol_size,
            },
            identity_file: self.identity_file.clone(),
            os: self.os.clone(),
            download,
            branch: self.branch.clone(),
            proxy: self.proxy_port.clone(),
            resume: self.resume,
            deploy_root: None,
        })
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let action: Action = cli.action.parse()?;
    let mut opts = cli.cluster_options()?;

    // Fail on the cheap checks before touching the environment or the network
    action.preflight(&opts)?;

    let credentials = Credentials::from_env()?;

    if action.deploys_templates() {
        opts.deploy_root = Some(find_deploy_dir(&opts.os)?);
    }

    let provider = Ec2Provider::connect(&credentials, &opts.launch.zone)
        .await
        .context("Failed to set up the EC2 client")?;
    tracing::debug!("Using region {}", provider.region());

    let shell = SshShell::new(opts.identity_file.clone());
    let confirm: Box<dyn Confirm> = if cli.yes {
        Box::new(AssumeYes)
    } else {
        Box::new(StdinConfirm)
    };

    let controller = LifecycleController::new(&provider, &shell, confirm.as_ref());
    match controller.execute(action, &cli.cluster_name, &opts).await? {
        Outcome::Master(address) => println!("{}", address),
        Outcome::Aborted => eprintln!("{}", "Aborted.".yellow()),
        Outcome::Completed => {
            if action != Action::Login {
                eprintln!("{} {} {}", "✓".green().bold(), action, cli.cluster_name.cyan());
            }
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // usage errors exit 1; --help and --version exit 0
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
