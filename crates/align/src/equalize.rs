use crate::model::{ReceiptRow, Side};

/// Two item sequences of equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct Equalized {
    /// The longer input; `A` when lengths already matched.
    pub reference: Side,
    pub a: Vec<ReceiptRow>,
    pub b: Vec<ReceiptRow>,
}

impl Equalized {
    /// Both sequences, reference side first.
    pub fn reference_first(&self) -> (&[ReceiptRow], &[ReceiptRow]) {
        match self.reference {
            Side::A => (&self.a, &self.b),
            Side::B => (&self.b, &self.a),
        }
    }

    pub fn len(&self) -> usize {
        self.a.len()
    }

    pub fn is_empty(&self) -> bool {
        self.a.is_empty()
    }
}

/// Pad the shorter sequence with empty items up to the longer one's length.
///
/// Padding rows forward-fill the group key of the last real row on their own
/// side, so padding never carries a foreign key.
pub fn equalize_length(a: Vec<ReceiptRow>, b: Vec<ReceiptRow>) -> Equalized {
    if a.len() >= b.len() {
        let b = pad_to(b, &a);
        Equalized {
            reference: Side::A,
            a,
            b,
        }
    } else {
        let a = pad_to(a, &b);
        Equalized {
            reference: Side::B,
            a,
            b,
        }
    }
}

fn pad_to(mut short: Vec<ReceiptRow>, reference: &[ReceiptRow]) -> Vec<ReceiptRow> {
    let target = reference.len();
    if short.len() >= target {
        return short;
    }
    // A side with no rows at all borrows the reference side's key.
    let Some(key) = short
        .last()
        .or_else(|| reference.last())
        .map(|row| row.key.clone())
    else {
        return short;
    };
    short.resize_with(target, || ReceiptRow::padding(key.clone()));
    short
}
