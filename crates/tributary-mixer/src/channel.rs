//! Channel mapping between source and destination layouts.

/// How source channels become destination channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMap {
    /// Same count: copy.
    Identity(usize),
    /// One source channel fanned out to every destination channel.
    MonoToMany(usize),
    /// Every source channel averaged into one.
    ManyToMono(usize),
    /// Fewer destination channels: destination `c` averages every source
    /// channel `s` with `s % dest == c`.
    Fold {
        /// Source channels.
        source: usize,
        /// Destination channels.
        dest: usize,
    },
    /// More destination channels: destination `c` reads source `c % source`.
    Wrap {
        /// Source channels.
        source: usize,
        /// Destination channels.
        dest: usize,
    },
}

impl ChannelMap {
    /// Picks the mapping for a channel count pair.
    pub fn new(source: usize, dest: usize) -> Self {
        debug_assert!(source > 0 && dest > 0);
        match (source, dest) {
            (s, d) if s == d => ChannelMap::Identity(s),
            (1, d) => ChannelMap::MonoToMany(d),
            (s, 1) => ChannelMap::ManyToMono(s),
            (s, d) if s > d => ChannelMap::Fold { source: s, dest: d },
            (s, d) => ChannelMap::Wrap { source: s, dest: d },
        }
    }

    /// Source channels per frame.
    pub fn source_channels(&self) -> usize {
        match *self {
            ChannelMap::Identity(n) | ChannelMap::ManyToMono(n) => n,
            ChannelMap::MonoToMany(_) => 1,
            ChannelMap::Fold { source, .. } | ChannelMap::Wrap { source, .. } => source,
        }
    }

    /// Destination channels per frame.
    pub fn dest_channels(&self) -> usize {
        match *self {
            ChannelMap::Identity(n) | ChannelMap::MonoToMany(n) => n,
            ChannelMap::ManyToMono(_) => 1,
            ChannelMap::Fold { dest, .. } | ChannelMap::Wrap { dest, .. } => dest,
        }
    }

    /// Maps one source frame into one destination frame.
    #[inline]
    pub fn map_frame(&self, source: &[f32], dest: &mut [f32]) {
        match *self {
            ChannelMap::Identity(_) => dest.copy_from_slice(source),
            ChannelMap::MonoToMany(_) => dest.fill(source[0]),
            ChannelMap::ManyToMono(n) => {
                dest[0] = source.iter().sum::<f32>() / n as f32;
            }
            ChannelMap::Fold { source: s, dest: d } => {
                for (c, out) in dest.iter_mut().enumerate() {
                    let mut sum = 0.0;
                    let mut count = 0;
                    for ch in (c..s).step_by(d) {
                        sum += source[ch];
                        count += 1;
                    }
                    *out = sum / count as f32;
                }
            }
            ChannelMap::Wrap { source: s, .. } => {
                for (c, out) in dest.iter_mut().enumerate() {
                    *out = source[c % s];
                }
            }
        }
    }
}
