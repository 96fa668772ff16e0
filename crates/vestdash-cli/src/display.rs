//! Human-readable formatting of amounts, times and plan status.

use chrono::{DateTime, Local};

use vestdash_core::model::{ReleasePlan, SessionView, TokenAmount};

use crate::config::DisplaySection;

impl DisplaySection {
    /// Amount in whole units, without the symbol.
    pub fn units(&self, amount: TokenAmount) -> String {
        amount.format_units(self.decimals)
    }

    /// Amount in whole units followed by the symbol.
    pub fn amount(&self, amount: TokenAmount) -> String {
        format!("{} {}", self.units(amount), self.symbol)
    }
}

/// Local wall-clock rendering of a plan's start time.
pub fn start_time(plan: &ReleasePlan) -> String {
    match plan.start_datetime() {
        Some(utc) => DateTime::<Local>::from(utc)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => plan.start_time.to_string(),
    }
}

pub fn status_label(plan: &ReleasePlan) -> &'static str {
    if plan.claimed { "Claimed" } else { "Pending" }
}

/// Plain-text listing of a view, as printed by `vestdash plans`.
pub fn render_view(view: &SessionView, display: &DisplaySection, now: u64) -> String {
    let mut out = String::new();
    let Some(account) = view.account else {
        out.push_str("No account connected.\n");
        return out;
    };

    out.push_str(&format!("Account:   {account}\n"));
    out.push_str(&format!(
        "Claimable: {}\n\n",
        display.amount(view.claimable_total)
    ));

    if view.plans.is_empty() {
        out.push_str("No release plans found\n");
        return out;
    }

    out.push_str(&format!("Release plans ({}):\n", view.plans.len()));
    for plan in &view.plans {
        let marker = if plan.is_claimable_at(now) { "*" } else { " " };
        out.push_str(&format!(
            "  [{marker}] {:>3}  {}  amount {}  delay comp {}  {}\n",
            plan.index,
            start_time(plan),
            display.units(plan.amount),
            display.units(plan.delay_compensation_amount),
            status_label(plan),
        ));
    }
    out.push_str("\n  * claimable now\n");
    out
}
