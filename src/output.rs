//! Plain-text listings of symbolic matrices, for inspection.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

use tracing::info;

use crate::{
    error::Result,
    expr::{ExprGraph, ExprId, SymbolId},
};

/// Renders a row-major matrix of expressions. The header names the
/// functions of time; shared sub-expressions are listed once as
/// temporaries before the entries.
pub fn format_matrix(
    graph: &ExprGraph,
    entries: &[ExprId],
    shape: (usize, usize),
    funcs_of_time: &[SymbolId],
) -> String {
    let names: Vec<&str> = funcs_of_time.iter().map(|s| graph.symbol_name(*s)).collect();
    let listing = graph.cse(entries);
    let mut out = format!(
        "# functions of time: {}\n# shape: {} x {}\n",
        names.join(", "),
        shape.0,
        shape.1
    );
    for (name, expr) in &listing.temporaries {
        out.push_str(&format!("{} = {}\n", name, expr));
    }
    for (k, expr) in listing.outputs.iter().enumerate() {
        out.push_str(&format!("[{}, {}] = {}\n", k / shape.1, k % shape.1, expr));
    }
    out
}

pub fn write_matrix_to_file(
    graph: &ExprGraph,
    entries: &[ExprId],
    shape: (usize, usize),
    path: &Path,
    funcs_of_time: &[SymbolId],
) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut file = BufWriter::new(File::create(path)?);
    file.write_all(format_matrix(graph, entries, shape, funcs_of_time).as_bytes())?;
    file.flush()?;
    info!(path = %path.display(), "wrote {} x {} matrix", shape.0, shape.1);
    Ok(())
}

#[cfg(test)]
mod output_tests {
    use super::*;

    #[test]
    fn listing_names_functions_of_time() {
        // Arrange
        let mut g = ExprGraph::new();
        let q = g.dynamic("q").unwrap();
        let m = g.constant("m").unwrap();
        let s = g.sin(q);
        let a = g.mul(&[m, s]);
        let b = g.add(&[s, m]);
        let q_symbol = g.as_symbol(q).unwrap();

        // Act
        let text = format_matrix(&g, &[a, b], (1, 2), &[q_symbol]);

        // Assert
        assert!(text.starts_with("# functions of time: q\n# shape: 1 x 2\n"));
        assert!(text.contains("[0, 0] = "));
        assert!(text.contains("[0, 1] = "));
    }

    #[test]
    fn writes_into_new_directory() {
        // Arrange
        let mut g = ExprGraph::new();
        let q = g.dynamic("q").unwrap();
        let dir = std::env::temp_dir().join(format!("whipple_output_{}", std::process::id()));
        let path = dir.join("vector.txt");

        // Act
        write_matrix_to_file(&g, &[q], (1, 1), &path, &[]).unwrap();

        // Assert
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("[0, 0] = q"));
        fs::remove_dir_all(&dir).unwrap();
    }
}
