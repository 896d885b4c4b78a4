use crate::machine::Machine;

/// A golf puzzle: leave the tape holding `targets`, using as few
/// instructions as possible.
///
/// Cells past the end of `targets` must be zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    targets: Vec<u8>,
}

/// Result of judging a machine's tape against a challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub solved: bool,
    /// Indices of cells that differ from the target.
    pub mismatched_cells: Vec<usize>,
    /// Instruction count of the loaded program, comments excluded.
    pub program_len: usize,
}

impl Challenge {
    pub fn new(targets: &[u8]) -> Self {
        Self {
            targets: targets.to_vec(),
        }
    }

    pub fn targets(&self) -> &[u8] {
        &self.targets
    }

    /// Judge the machine's current tape. Targets that do not fit on the
    /// tape count as mismatches at their index.
    pub fn evaluate(&self, machine: &Machine) -> Verdict {
        let tape = machine.tape();
        let len = tape.len().max(self.targets.len());
        let mismatched_cells: Vec<usize> = (0..len)
            .filter(|&i| tape.get(i).copied() != Some(self.target(i)))
            .collect();

        Verdict {
            solved: mismatched_cells.is_empty(),
            mismatched_cells,
            program_len: machine.program().len(),
        }
    }

    fn target(&self, index: usize) -> u8 {
        self.targets.get(index).copied().unwrap_or(0)
    }
}
