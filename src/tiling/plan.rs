//! Splitting an output row into tiles.
//!
//! The row is `left pad | steady | right pad`. Padded columns always go
//! through the bounds-checked single-column path. The steady run is eaten
//! 6 columns at a time, then at most one 3-tile and one 2-tile; whatever is
//! left (0 or 1 column) joins the right padding.
//!
//! 6 is the widest tile that fits 4 filter rows in the register file without
//! spilling (24 accumulators + broadcasts + a filter vector on a 32-register
//! NEON/AVX-512 file). 3 and 2 make every remainder 0..=5 cost at most one
//! extra tile plus the single path. The widths are plain constants so they
//! can be retuned; the dispatcher matches on them by name.

/// Steady-state tile width.
pub const WIDE_TILE: usize = 6;
/// First remainder tile.
pub const MID_TILE: usize = 3;
/// Second remainder tile.
pub const NARROW_TILE: usize = 2;

/// One unit of work for the dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// A full-width tile of `columns` steady-state outputs.
    Tile { columns: usize },
    /// `columns` outputs computed one at a time; `padded` selects the
    /// bounds-checked walk.
    Single { columns: usize, padded: bool },
}

impl Step {
    pub fn columns(self) -> usize {
        match self {
            Step::Tile { columns } | Step::Single { columns, .. } => columns,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    LeftPad,
    Wide,
    Mid,
    Narrow,
    Tail,
    Done,
}

/// Deterministic left-to-right schedule for one output row.
#[derive(Clone, Debug)]
pub struct RowPlan {
    stage: Stage,
    left_pad: usize,
    remaining: usize,
    right_pad: usize,
    padded: bool,
}

impl RowPlan {
    /// Row of a spatial kernel: padded columns on both sides.
    pub fn padded(left_pad: usize, output_count: usize, right_pad: usize) -> Self {
        RowPlan {
            stage: Stage::LeftPad,
            left_pad,
            remaining: output_count,
            right_pad,
            padded: true,
        }
    }

    /// Row without any padding (pointwise). The last column, if the ladder
    /// leaves one, runs as an unchecked single column.
    pub fn unpadded(output_count: usize) -> Self {
        RowPlan {
            stage: Stage::Wide,
            left_pad: 0,
            remaining: output_count,
            right_pad: 0,
            padded: false,
        }
    }

    fn take(&mut self, columns: usize) -> Option<Step> {
        self.remaining -= columns;
        Some(Step::Tile { columns })
    }
}

impl Iterator for RowPlan {
    type Item = Step;

    fn next(&mut self) -> Option<Step> {
        loop {
            match self.stage {
                Stage::LeftPad => {
                    self.stage = Stage::Wide;
                    if self.left_pad > 0 {
                        return Some(Step::Single {
                            columns: self.left_pad,
                            padded: true,
                        });
                    }
                }
                Stage::Wide => {
                    if self.remaining >= WIDE_TILE {
                        return self.take(WIDE_TILE);
                    }
                    self.stage = Stage::Mid;
                }
                Stage::Mid => {
                    self.stage = Stage::Narrow;
                    if self.remaining >= MID_TILE {
                        return self.take(MID_TILE);
                    }
                }
                Stage::Narrow => {
                    self.stage = Stage::Tail;
                    if self.remaining >= NARROW_TILE {
                        return self.take(NARROW_TILE);
                    }
                }
                Stage::Tail => {
                    self.stage = Stage::Done;
                    let columns = self.remaining + self.right_pad;
                    self.remaining = 0;
                    if columns > 0 {
                        return Some(Step::Single {
                            columns,
                            padded: self.padded,
                        });
                    }
                }
                Stage::Done => return None,
            }
        }
    }
}
