//! The `exgen eval` command.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;

use exgen_core::formula::{
    parse_expression, Bindings, EquationSolver, FormulaSolver, Variable,
};
use exgen_core::interpolate::format_value;

pub fn execute(
    input: String,
    assignments: Vec<(String, f64)>,
    distribute: Option<String>,
    clean: bool,
    unknown: Option<String>,
) -> Result<()> {
    if input.contains('=') {
        return solve(&input, &assignments, unknown.as_deref());
    }
    anyhow::ensure!(unknown.is_none(), "--unknown needs an equation");

    let mut expr = parse_expression(&input)?;
    if let Some(var) = &distribute {
        expr = expr.distribute_multiplication(var);
    }
    if clean {
        expr = expr.get_clean();
    }
    println!("{expr}");

    let bindings: Bindings = assignments.into_iter().collect();
    let unbound: Vec<String> = expr
        .variables()
        .into_iter()
        .filter(|name| !bindings.contains_key(name))
        .collect();
    if unbound.is_empty() {
        println!("= {}", format_value(expr.evaluate(&bindings)?));
    } else {
        println!("unbound: {}", unbound.join(", "));
    }

    Ok(())
}

fn solve(equation: &str, assignments: &[(String, f64)], unknown: Option<&str>) -> Result<()> {
    let variables: Vec<Variable> = assignments
        .iter()
        .map(|(name, value)| Variable::number(name.as_str(), *value))
        .collect();
    // Only interval variables draw from the source; `--set` binds plain numbers.
    let mut rng = StdRng::seed_from_u64(0);
    let values = EquationSolver.solve(equation, &variables, unknown, &mut rng)?;
    for (name, value) in &values {
        println!("{name} = {}", format_value(*value));
    }
    Ok(())
}
