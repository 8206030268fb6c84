use super::errors::ApportionmentError;
use super::rational::{shortest_decimal_between, Ratio};

// ============================================================================
// Divisor Method with Standard Rounding
// ============================================================================
//
// Highest averages: every weight offers the quotients w/0.5, w/1.5, w/2.5,
// ...; the `house` largest win. This is the same allocation as rounding
// w/D half up for any divisor D in the feasible interval. When the quotient
// at the cut is shared by more weights than seats remain, the allocation is
// open and needs a lot decision.
//
// ============================================================================

/// Marginal seats that the quotients cannot decide
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivisorTie {
    /// Indices of the weights sharing the marginal quotient
    pub contenders: Vec<usize>,
    /// How many of them get a seat
    pub seats: u32,
}

#[derive(Debug, Clone)]
pub struct DivisorApportionment {
    pub seats: Vec<u32>,
    pub tie: Option<DivisorTie>,
}

impl DivisorApportionment {
    /// Hand the open seats of a tie to `winners`
    pub fn resolve(&mut self, winners: &[usize]) {
        if let Some(tie) = self.tie.take() {
            for &index in winners {
                if tie.contenders.contains(&index) {
                    self.seats[index] += 1;
                }
            }
        }
    }

    /// Divisor that reproduces the allocation by rounding. Strictly inside
    /// the feasible interval and as short as possible; the shared quotient
    /// itself when the tie is still open or was decided by lot.
    pub fn divisor(&self, weights: &[Ratio]) -> Result<Ratio, ApportionmentError> {
        let mut lo = Ratio::zero();
        let mut hi: Option<Ratio> = None;

        for (weight, &seats) in weights.iter().zip(&self.seats) {
            let next = weight.standard_quotient(seats)?;
            lo = lo.max(next);
            if seats > 0 {
                let last = weight.standard_quotient(seats - 1)?;
                hi = Some(hi.map_or(last, |hi| hi.min(last)));
            }
        }

        if self.tie.is_some() {
            return Ok(lo);
        }
        match hi {
            Some(hi) if hi == lo => Ok(lo),
            hi => shortest_decimal_between(&lo, hi.as_ref()),
        }
    }
}

/// Distribute `house` seats over `weights`
pub fn apportion(weights: &[Ratio], house: u32) -> Result<DivisorApportionment, ApportionmentError> {
    let mut seats = vec![0u32; weights.len()];
    if house == 0 {
        return Ok(DivisorApportionment { seats, tie: None });
    }

    let mut quotients = Vec::with_capacity(weights.len() * house as usize);
    for (index, weight) in weights.iter().enumerate().filter(|(_, w)| !w.is_zero()) {
        for held in 0..house {
            quotients.push((weight.standard_quotient(held)?, index));
        }
    }
    if quotients.is_empty() {
        return Err(ApportionmentError::NoVotes);
    }

    quotients.sort_by(|(a, i), (b, j)| b.cmp(a).then(i.cmp(j)));
    let cut = quotients[house as usize - 1].0;

    let mut contenders = Vec::new();
    let mut assigned = 0u32;
    for (quotient, index) in &quotients {
        if *quotient > cut {
            seats[*index] += 1;
            assigned += 1;
        } else if *quotient == cut {
            contenders.push(*index);
        } else {
            break;
        }
    }

    let open = house - assigned;
    if contenders.len() as u32 == open {
        for index in contenders {
            seats[index] += 1;
        }
        return Ok(DivisorApportionment { seats, tie: None });
    }

    Ok(DivisorApportionment {
        seats,
        tie: Some(DivisorTie { contenders, seats: open }),
    })
}
