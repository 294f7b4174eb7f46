//! Output rendering
//!
//! Decoded entries are rendered into one of five text formats, selected by
//! the ending of the output file name:
//!
//! | Ending         | Content                                          |
//! |----------------|--------------------------------------------------|
//! | `.interpreted` | attribute dump with symbolized stacks            |
//! | `.btb_lines`   | hex dump of every record                         |
//! | `.folded`      | folded stacks (`root;...;leaf weight`)           |
//! | `.histogram`   | CSV of the stack depth histograms                |
//! | `.durations`   | CSV of sample durations and intervals            |

pub mod output;
pub mod render;

pub use output::{LineSink, MemorySink, OutputMode, OutputStreams};
pub use render::{RenderOptions, RenderStats, Renderer, DURATIONS_HEADER, HISTOGRAM_HEADER};
