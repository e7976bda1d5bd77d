use smallvec::SmallVec;
use smartstring::alias::String as SmartString;

use crate::{CausalGraph, Frontier, LV};
use crate::causalgraph::agent_assignment::AgentAssignment;
use crate::frontier::FrontierRef;
use crate::lvrange::LVRange;
use crate::rle::{AppendRle, HasLength, RleSpanHelpers};

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SummaryEntry {
    pub name: SmartString,
    pub seq_ranges: SmallVec<LVRange, 2>,
}

/// A version summary names the ranges of sequence numbers known for each
/// agent. Summaries are how two peers work out what the other is missing:
/// send a summary, intersect it, exchange the difference.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct VersionSummary(pub(crate) Vec<SummaryEntry>);

// Serializes as {name1: [[start, end], [start, end], ...], name2: ...}.
#[cfg(feature = "serde")]
mod serde_encoding {
    use std::fmt::Formatter;
    use serde::ser::SerializeMap;
    use serde::de::{MapAccess, Visitor};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use smallvec::SmallVec;
    use smartstring::alias::String as SmartString;
    use crate::causalgraph::summary::{SummaryEntry, VersionSummary};
    use crate::lvrange::LVRange;

    impl Serialize for VersionSummary {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error> where S: Serializer {
            let mut map = serializer.serialize_map(Some(self.0.len()))?;
            for e in &self.0 {
                map.serialize_entry(&e.name, &e.seq_ranges)?;
            }
            map.end()
        }
    }

    struct VSVisitor;

    impl<'de> Visitor<'de> for VSVisitor {
        type Value = VersionSummary;

        fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
            formatter.write_str("a version summary map")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error> where A: MapAccess<'de> {
            let mut vs = VersionSummary(Vec::with_capacity(map.size_hint().unwrap_or(0)));

            while let Some((k, v)) = map.next_entry::<SmartString, SmallVec<LVRange, 2>>()? {
                vs.0.push(SummaryEntry {
                    name: k,
                    seq_ranges: v,
                })
            }
            Ok(vs)
        }
    }

    impl<'de> Deserialize<'de> for VersionSummary {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error> where D: Deserializer<'de> {
            deserializer.deserialize_map(VSVisitor)
        }
    }
}

impl AgentAssignment {
    pub fn summarize_versions(&self) -> VersionSummary {
        VersionSummary(self.client_data.iter().filter_map(|c| {
            if c.lv_for_seq.is_empty() { None } else {
                let mut seq_ranges: SmallVec<LVRange, 2> = SmallVec::new();
                for e in c.lv_for_seq.iter() {
                    // lv_for_seq is ordered by seq, so adjacent runs coalesce.
                    seq_ranges.push_rle(e.span());
                }

                Some(SummaryEntry {
                    name: c.name.clone(),
                    seq_ranges,
                })
            }
        }).collect())
    }

    /// Walk a foreign summary against the local assignment, calling back with
    /// each seq range either known locally (with the LV its run starts at) or
    /// unknown (None).
    pub fn intersect_with_summary_full<'a, V>(&self, summary: &'a VersionSummary, mut visitor: V)
        where V: FnMut(&'a str, LVRange, Option<LV>)
    {
        for SummaryEntry { name, seq_ranges } in summary.0.iter() {
            if let Some(agent_id) = self.get_agent_id(name) {
                let client_data = &self.client_data[agent_id as usize];

                for seq_range in seq_ranges {
                    // iter_range skips gaps, so we manually yield those as
                    // unknown.
                    let mut expect_next_seq = seq_range.start;
                    for entry in client_data.lv_for_seq.iter_range(*seq_range) {
                        let seq_range = entry.span();

                        if seq_range.start > expect_next_seq {
                            visitor(name, (expect_next_seq..seq_range.start).into(), None);
                        }

                        expect_next_seq = seq_range.end;

                        visitor(name, seq_range, Some(entry.1.start));
                    }

                    if expect_next_seq < seq_range.end {
                        visitor(name, (expect_next_seq..seq_range.end).into(), None);
                    }
                }
            } else {
                // We know nothing from this agent.
                for seq_range in seq_ranges {
                    visitor(name, *seq_range, None);
                }
            }
        }
    }
}

impl CausalGraph {
    /// Intersect a foreign summary with this graph. Returns the frontier of
    /// everything both sides know (merged with `frontier`), and the portion
    /// of the summary which is locally unknown, if any.
    pub fn intersect_with_summary(&self, summary: &VersionSummary, frontier: FrontierRef)
        -> (Frontier, Option<VersionSummary>)
    {
        let mut remainder: Option<VersionSummary> = None;

        // Accumulate all the versions we see, then keep the dominators.
        let mut versions: SmallVec<LV, 4> = frontier.into();

        self.agent_assignment.intersect_with_summary_full(summary, |name, seq_range, v| {
            if let Some(v) = v {
                let v_last = v + seq_range.len() - 1;
                versions.push(v_last);
            } else {
                let remainder = remainder.get_or_insert_with(Default::default);
                match remainder.0.last_mut() {
                    Some(entry) if entry.name == name => {
                        entry.seq_ranges.push(seq_range);
                    }
                    _ => {
                        remainder.0.push(SummaryEntry {
                            name: name.into(),
                            seq_ranges: {
                                let mut ranges = SmallVec::new();
                                ranges.push(seq_range);
                                ranges
                            },
                        })
                    }
                }
            }
        });

        versions.sort_unstable();
        (
            self.graph.find_dominators(&versions),
            remainder,
        )
    }
}
