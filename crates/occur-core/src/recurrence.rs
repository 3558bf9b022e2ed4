use chrono::{Datelike, Days, NaiveDate};

use crate::models::{EndCondition, Frequency, RecurrenceRule, TaskTemplate};

impl RecurrenceRule {
    /// Returns whether `candidate` falls on the pattern that starts at
    /// `anchor`, ignoring end conditions.
    ///
    /// Monthly and yearly rules require the anchor's day of month. A monthly
    /// rule anchored on the 31st therefore never matches a 30-day month, and
    /// a yearly rule anchored on February 29th only matches leap years.
    #[inline]
    pub fn occurs_on(&self, anchor: NaiveDate, candidate: NaiveDate) -> bool {
        if candidate < anchor {
            return false;
        }
        let interval = i64::from(self.interval());
        match self.frequency() {
            Frequency::Daily => (candidate - anchor).num_days() % interval == 0,
            Frequency::Weekly => {
                let days = (candidate - anchor).num_days();
                days % 7 == 0 && (days / 7) % interval == 0
            }
            Frequency::Monthly => {
                let months = i64::from(candidate.year() - anchor.year()) * 12
                    + (i64::from(candidate.month()) - i64::from(anchor.month()));
                candidate.day() == anchor.day() && months % interval == 0
            }
            Frequency::Yearly => {
                let years = i64::from(candidate.year() - anchor.year());
                candidate.month() == anchor.month()
                    && candidate.day() == anchor.day()
                    && years % interval == 0
            }
        }
    }

    /// Number of days within which at least one further occurrence must
    /// appear if the series has not ended.
    fn search_horizon_days(&self) -> u64 {
        let interval = u64::from(self.interval());
        match self.frequency() {
            Frequency::Daily => interval,
            Frequency::Weekly => 7 * interval,
            // A day-31 anchor can skip months, but cycles back within a year of steps.
            Frequency::Monthly => 31 * 12 * interval,
            // Feb 29 anchors can go eight years between leap days across a century.
            Frequency::Yearly => 366 * 8 * interval,
        }
    }
}

/// Expands one template into concrete occurrence dates.
///
/// The generator holds no state beyond borrowed inputs; every call is a pure
/// function of the template and the requested window.
#[derive(Debug, Clone, Copy)]
pub struct OccurrenceGenerator<'a> {
    template: &'a TaskTemplate,
    anchor: NaiveDate,
    rule: RecurrenceRule,
}

impl<'a> OccurrenceGenerator<'a> {
    /// Returns `None` for templates that have no anchor or no recurrence;
    /// those produce no virtual instances.
    pub fn for_template(template: &'a TaskTemplate) -> Option<Self> {
        match (template.anchor_date, template.recurrence) {
            (Some(anchor), Some(rule)) => Some(Self {
                template,
                anchor,
                rule,
            }),
            _ => None,
        }
    }

    pub fn template(&self) -> &TaskTemplate {
        self.template
    }

    pub fn anchor(&self) -> NaiveDate {
        self.anchor
    }

    pub fn rule(&self) -> &RecurrenceRule {
        &self.rule
    }

    /// Generates occurrences within `[start, end]`, ascending.
    ///
    /// Candidates are scanned one day at a time from the later of the anchor
    /// and `start` up to the earlier of `end` and the rule's end date. For
    /// `AfterCount(n)` the scan starts at the anchor instead, so the count is
    /// series-wide and repeated windowed calls agree with one long call.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        let upper = match self.rule.until() {
            Some(until) => end.min(until),
            None => end,
        };
        let max_count = self.rule.max_count();
        let scan_from = if max_count.is_some() {
            self.anchor
        } else {
            self.anchor.max(start)
        };

        let mut occurrences = Vec::new();
        if scan_from > upper || start > upper {
            return occurrences;
        }

        let mut seen: u32 = 0;
        let mut candidate = scan_from;
        loop {
            if self.rule.occurs_on(self.anchor, candidate) {
                seen += 1;
                if candidate >= start {
                    occurrences.push(candidate);
                }
                if max_count.is_some_and(|n| seen >= n) {
                    break;
                }
            }
            if candidate >= upper {
                break;
            }
            match candidate.succ_opt() {
                Some(next) => candidate = next,
                None => break,
            }
        }

        occurrences
    }

    /// Whether `date` is one of this series' occurrences, end conditions
    /// included.
    pub fn contains(&self, date: NaiveDate) -> bool {
        if !self.rule.occurs_on(self.anchor, date) {
            return false;
        }
        match self.rule.end_condition() {
            EndCondition::Never => true,
            EndCondition::UntilDate(until) => date <= until,
            EndCondition::AfterCount(_) => self.between(date, date).contains(&date),
        }
    }

    /// First occurrence strictly after `after`, or `None` if the series has
    /// ended.
    pub fn next_after(&self, after: NaiveDate) -> Option<NaiveDate> {
        let from = after.succ_opt()?;
        let from = from.max(self.anchor);
        let horizon = from
            .checked_add_days(Days::new(self.rule.search_horizon_days()))
            .unwrap_or(NaiveDate::MAX);
        self.between(from, horizon).into_iter().next()
    }
}

/// Occurrence dates of `template` within `[window_start, window_end]`.
///
/// Templates without an anchor date or a recurrence rule yield an empty
/// sequence; that is a normal state for a one-off task.
pub fn generate(
    template: &TaskTemplate,
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> Vec<NaiveDate> {
    OccurrenceGenerator::for_template(template)
        .map(|generator| generator.between(window_start, window_end))
        .unwrap_or_default()
}
