use fenewton::prelude::*;
use fenewton::StrError;
use structopt::StructOpt;

/// Command line options
#[derive(StructOpt, Debug)]
#[structopt(
    name = "fenewton_demo",
    about = "Solves a chain of nonlinear springs with the quasi-Newton solver"
)]
struct Options {
    /// Quasi-Newton method: FULL_NEWTON, BFGS, BROYDEN, or JFNK
    #[structopt(short, long, default_value = "BFGS")]
    method: String,

    /// Number of springs
    #[structopt(short, long, default_value = "10")]
    n_springs: usize,

    /// Coefficient of the cubic term of the spring force
    #[structopt(short, long, default_value = "10.0")]
    beta: f64,

    /// Load at the last node at the final time
    #[structopt(short, long, default_value = "50.0")]
    load: f64,

    /// Time increment
    #[structopt(short, long, default_value = "0.25")]
    dt: f64,

    /// Position of a rigid wall in front of the last node (augmented contact)
    #[structopt(short, long)]
    wall: Option<f64>,

    /// Writes a deep checkpoint of the solver to this JSON file
    #[structopt(short, long)]
    checkpoint: Option<String>,

    /// Shows the convergence table of each time step
    #[structopt(short, long)]
    verbose: bool,
}

fn main() -> Result<(), StrError> {
    // parse options
    let options = Options::from_args();
    let method = QnMethod::from_key(&options.method)?;

    // model
    let mut chain = SpringChain::new(options.n_springs, 100.0, options.beta)?;
    chain.set_load(options.load);
    if let Some(wall) = options.wall {
        let mut contact = GapContact::new(&[options.n_springs], wall, 1e5)?;
        contact.set_augmentation(0.01, 0.0, 0, 20)?;
        chain.add_contact(contact)?;
    }

    // solver
    let mut config = Config::new();
    config
        .set_qn_method(method)
        .set_verbose(options.verbose, options.verbose, options.verbose, false);
    let mut solver = NewtonSolver::new(&config)?;
    solver.init(chain.neq())?;

    // run
    let mut stepper = TimeStepper::new(0.0, 1.0, options.dt, 1e-6)?;
    stepper.set_verbose(true);
    stepper.run(&mut solver, &mut chain)?;

    // results
    let u = chain.displacements();
    let thin_line = format!("{:─^1$}", "", 40);
    println!("\n{}", thin_line);
    println!("{:>6} {:>15}", "node", "u");
    for (node, value) in u.iter().enumerate() {
        println!("{:>6} {:>15.8}", node, value);
    }
    println!("{}", thin_line);
    println!("accepted steps = {}", stepper.n_accepted);
    println!("rejected steps = {}", stepper.n_rejected);
    println!("{}", solver.timers());

    // checkpoint
    if let Some(path) = &options.checkpoint {
        solver.checkpoint(true).write_json(path)?;
        println!("checkpoint written to {}", path);
    }
    println!("{}\n", thin_line);
    Ok(())
}
