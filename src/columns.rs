//! Column names of the source tables and of the derived position frame.
//!
//! Source headers are reproduced exactly as the upstream exports spell them,
//! including their typos ("Provious").

/// Current- and prior-period contract master ("combo") export.
pub mod master {
    pub const CONTRACT_ID: &str = "CCLM ID";
    pub const CONTRACT_NAME: &str = "Contract Name";
    pub const CONTRACT_TYPE: &str = "Contract Type";
    pub const MARK: &str = "Mark";
    pub const CATEGORY_1: &str = "Category 1";
    pub const CATEGORY_2: &str = "Category 2";
    pub const PREVIOUS_VERSION_MARK: &str = "Previous Version Mark";
    pub const CATEGORY_FA: &str = "Category(FA)";
    pub const CATEGORY_PO: &str = "Category(PO)";
    pub const CONTRACT_YEAR: &str = "Contract Year";
    pub const SCENARIO: &str = "Scenario";
    pub const PROJECT_DEFINITION: &str = "Project Definition";
    pub const LE: &str = "LE";
    pub const CUSTOMER_UNIT: &str = "Customer Unit";
    pub const PROVINCE: &str = "Province";
    pub const PSP: &str = "PSP";
    pub const CPM: &str = "CPM";
    pub const CPM_DELEGATION: &str = "CPM Delegation";
    pub const CPM_LM_SIGNUM: &str = "CPM LM Signum";
    pub const SITE: &str = "Site";
    pub const CATEGORY: &str = "Category";
    pub const CONT_VALUE: &str = "Cont Value";
    pub const OEF_VALUE: &str = "OEF Value";
    pub const PD_CREATION_DATE: &str = "PD Creation Date";
    pub const ES_APPROVED_DATE: &str = "ES Approved Date";
    pub const SIGNED_DATE: &str = "Signed Date";
    pub const FIRST_DELIVERY_DATE: &str = "First Delivery Date";
    pub const LAST_OA_DATE: &str = "Last OA Date";
    pub const LAST_POD_DATE: &str = "Last POD Date";
    pub const DAC_DATE_CURRENT: &str = "Dac Date Current";
    pub const DAC_DATE_ACTUAL: &str = "Dac Date Actual";
    pub const DAC_VALUE: &str = "Dac Value";
    pub const PAC_BASELINE: &str = "Pac Baseline";
    pub const PAC_OR_CUTOVER: &str = "PAC or Cutover";
    pub const PAC_DATE_CURRENT: &str = "Pac/CO Date Current";
    pub const PAC_DATE_ACTUAL: &str = "Pac/CO Date Actual";
    pub const PAC_VALUE: &str = "Pac Value";
    pub const FAC_BASELINE: &str = "FAC Baseline";
    pub const FAC_DATE_CURRENT: &str = "Fac Date Current";
    pub const FAC_DATE_ACTUAL: &str = "Fac Date Actual";
    pub const FAC_VALUE: &str = "Fac Value";
    pub const ACC_COLLECTION: &str = "Acc. Collection";
    pub const ACC_COLLECTION_PCT: &str = "Acc. Collection %";
    pub const HAVE_PO: &str = "Have Po";
    pub const UPDATED_ON: &str = "Updated On";
    pub const EARLY_COLLECTION: &str = "Early Collection";
    pub const BACK_STOP: &str = "Back Stop";
    pub const ALERT_MESSAGE: &str = "Alert Message";
    pub const REASON: &str = "Reason";
    pub const CPM_COMMENTS: &str = "CPM Comments";

    // Prior-period export only.
    pub const DAC_DATE_PREVIOUS: &str = "Dac Date Provious";
    pub const PAC_DATE_PREVIOUS: &str = "Pac/CO Date Provious";
    pub const FAC_DATE_PREVIOUS: &str = "Fac Date Provious";
}

/// Collections ledger, one or more rows per contract.
pub mod ledger {
    pub const CONTRACT_ID: &str = "CCLMID";
    pub const COLLECTION: &str = "Collection";
}

/// Billing / AR export ("PFT").
pub mod billing {
    pub const CONTRACT_ID: &str = "Contract No.";
    pub const UNBILLED_TOTAL: &str = "Unbilled Total";
    pub const BILLED_TOTAL: &str = "Billed Total";
    pub const BILLED_NOT_DUE: &str = "Billed Not Due";
    pub const BILLED_OVERDUE: &str = "Billed Overdue";
    pub const PAYMENT_TERM: &str = ">PaymentTerm";
    pub const BILLED_DEL: &str = "Billed Del";
    pub const BILLED_PAC: &str = "Billed PAC";
    pub const BILLED_FAC: &str = "Billed FAC";
    pub const BILLED_ACT: &str = "Billed ACT";
    pub const TOTAL_AR: &str = "Total AR";
}

/// Quarterly target table.
pub mod target {
    pub const CONTRACT_ID: &str = "Contract No.";
    pub const DEFAULT_VALUE_COLUMN: &str = "Q4F9RES";
}

/// Manual adjustment sheets.
pub mod manual {
    pub const BALANCE_CONTRACT_ID: &str = "Contract";
    pub const BALANCE: &str = "Balance";
    pub const CONTRACT_ID: &str = "Contract No";
    pub const CONTRACT_STATUS: &str = "Contract status";
    pub const LONG_AGED_SUFFIX: &str = "long aged";
}

/// Columns of the derived position frame. The prior-period snapshot is a
/// previous run's frame, so it is read with these names too.
pub mod out {
    pub const PERIOD: &str = "Period";
    pub const CONTRACT_NO: &str = "Contract No";
    pub const CONTRACT_NAME: &str = "Contract Name";
    pub const CONTRACT_TYPE: &str = "Contract Type";
    pub const MARK: &str = "Mark";
    pub const CATEGORY_1: &str = "Category 1";
    pub const CATEGORY_2: &str = "Category 2";
    pub const PREVIOUS_VERSION_MARK: &str = "Previous Version Mark";
    pub const CATEGORY_FA: &str = "Category(FA)";
    pub const CATEGORY_PO: &str = "Category(PO)";
    pub const CONTRACT_YEAR: &str = "Contract Year";
    pub const SCENARIO: &str = "Scenario";
    pub const PROJECT_DEFINITION: &str = "Project Definition";
    pub const LE: &str = "LE";
    pub const BD: &str = "BD";
    pub const PROVINCE: &str = "Province";
    pub const PSP: &str = "PSP";
    pub const CPM: &str = "CPM";
    pub const CPM_DELEGATION: &str = "CPM Delegation";
    pub const CPM_LM_SIGNUM: &str = "CPM LM Signum";
    pub const SITE: &str = "Site";
    pub const CATEGORY: &str = "Category";
    pub const CV_COMBO: &str = "CV (Combo)";
    pub const CV_OEF: &str = "CV (OEF)";
    pub const PD_CREATION_DATE: &str = "PD Creation Date";
    pub const ES_APPROVED_DATE: &str = "ES Approved Date";
    pub const SIGNED_DATE: &str = "Signed Date";
    pub const FIRST_DELIVERY_DATE: &str = "First Delivery Date";
    pub const LAST_OA_DATE: &str = "Last OA Date";
    pub const LAST_POD_DATE: &str = "Last POD Date";
    pub const PAC_BASELINE: &str = "Pac Baseline";
    pub const PAC_OR_CUTOVER: &str = "PAC or Cutover";
    pub const FAC_BASELINE: &str = "Fac Baseline";
    pub const ACC_COLLECTION_COMBO: &str = "Acc. Collection";
    pub const ACC_COLLECTION_PCT: &str = "Acc. Collection %";
    pub const HAVE_PO: &str = "Have Po";
    pub const UPDATED_ON: &str = "Updated On";
    pub const EARLY_COLLECTION: &str = "Early Collection";
    pub const BACK_STOP: &str = "Back Stop";
    pub const ALERT_MESSAGE: &str = "Alert Message";
    pub const REASON: &str = "Reason";
    pub const CPM_COMMENTS: &str = "CPM Comments";

    pub const UNBILLED: &str = "Unbilled";
    pub const BILLED: &str = "Billed";
    pub const BILLED_NOT_DUE: &str = "Billed not due";
    pub const BILLED_OVERDUE: &str = "Billed overdue";
    pub const PAYTERM: &str = "Payterm";
    pub const ACC_COLLECTION: &str = "Acc Collection";
    pub const AR_INDICATOR: &str = "AR indicator";
    pub const DAC_TERM: &str = "DAC term";
    pub const PAC_TERM: &str = "PAC term";
    pub const FAC_TERM: &str = "FAC term";
    pub const ACT_TERM: &str = "ACT term";

    pub const AMT_TO_ADD_TOTAL: &str = "Amt to add-Total";
    pub const DEL_AMT_TO_ADD: &str = "DEL amt to add";
    pub const PAC_AMT_TO_ADD: &str = "PAC amt to add";
    pub const FAC_AMT_TO_ADD: &str = "FAC amt to add";

    pub const FIVE_GC: &str = "5GC or not";
    pub const IF_AMT_HAS_VALUE: &str = "If amt to add has value";
    pub const IF_DEL_HAS_VALUE: &str = "If DEL has value";
    pub const PAC_FAC_DELAY_FILTER: &str = "PAC/FAC delay filter";
    pub const PO_CLOSED: &str = "PO closed";

    pub const FILTER_FOR_COM: &str = "Filter for COM";
    pub const LEAD_TIME_THRESHOLD: &str = "Lead time threshhold";
    pub const DEL_CHANGE_ICON: &str = "DEL change icon";

    pub const PAC_FAC_AFTER_Q4: &str = "PAC/FAC after Q4";
    pub const PAC_FAC_OTHER: &str = "PAC/FAC other";
    pub const PAC_FAC_OVER_185_TOTAL: &str = "PAC+FAC amount >185";

    pub const BILLED_DEL: &str = "Billed Del";
    pub const BILLED_PAC: &str = "Billed PAC";
    pub const BILLED_FAC: &str = "Billed FAC";
    pub const BILLED_ACT: &str = "Billed ACT";
    pub const BILLED_TOTAL: &str = "Billed Total";
    pub const TOTAL_AR: &str = "Total AR";

    pub const DAC_LEADTIME_D3_D2: &str = "DAC leadtime (D3-D2)";
    pub const DAC_LEADTIME_D2_D1: &str = "DAC leadtime (D2-D1)";

    pub fn cash_landing(month: u32) -> String {
        format!("{:02}A Cash Landing(PFT)", month)
    }

    pub fn quarter_landing(quarter: u32) -> String {
        format!("Q{} landing", quarter)
    }

    pub fn quarter_target(quarter: u32) -> String {
        format!("Q{} Target", quarter)
    }

    pub fn quarter_target_balance(quarter: u32) -> String {
        format!("Q{} Target balance", quarter)
    }

    pub fn combined_in_quarter(quarter: u32) -> String {
        format!("PAC/FAC in Q{}", quarter)
    }
}

/// Per-milestone column names shared by all three milestones.
#[derive(Debug, Clone, Copy)]
pub struct MilestoneColumns {
    pub date_previous: &'static str,
    pub date_current: &'static str,
    pub date_actual: &'static str,
    pub value: &'static str,
    pub indicator: &'static str,
    pub lead_time: &'static str,
    pub amt_to_add: &'static str,
}

pub const DEL_COLUMNS: MilestoneColumns = MilestoneColumns {
    date_previous: "DEL Date Previous",
    date_current: "DEL Date Current",
    date_actual: "DEL Date Actual",
    value: "DEL Value-Combo",
    indicator: "DAC indicator",
    lead_time: "DAC Lead time",
    amt_to_add: out::DEL_AMT_TO_ADD,
};

pub const PAC_COLUMNS: MilestoneColumns = MilestoneColumns {
    date_previous: "PAC Date Previous",
    date_current: "PAC Date Current",
    date_actual: "PAC Date Actual",
    value: "PAC Value-Combo",
    indicator: "PAC indicator",
    lead_time: "PAC Lead time",
    amt_to_add: out::PAC_AMT_TO_ADD,
};

pub const FAC_COLUMNS: MilestoneColumns = MilestoneColumns {
    date_previous: "FAC Date Previous",
    date_current: "FAC Date Current",
    date_actual: "FAC Date Actual",
    value: "FAC Value-Combo",
    indicator: "FAC indicator",
    lead_time: "FAC Lead time",
    amt_to_add: out::FAC_AMT_TO_ADD,
};

/// Aging and follow-up columns that exist only for PAC and FAC. Labels are
/// kept exactly as the published report spells them.
#[derive(Debug, Clone, Copy)]
pub struct AgingColumns {
    pub prefix: &'static str,
    pub avg_lead_time: &'static str,
    pub over_185: &'static str,
    pub over_185_label: &'static str,
    pub days_elapsed: &'static str,
    pub amt_elapsed: &'static str,
    pub lead_time_last_month: &'static str,
    pub lead_time_change: &'static str,
    pub if_has_value: &'static str,
    pub delay_filter: &'static str,
    pub change_icon: &'static str,
    pub change_icon_label: &'static str,
    pub over_185_cpm: &'static str,
    pub over_185_cpm_label: &'static str,
    pub over_185_amt: &'static str,
    pub by_year: &'static str,
    pub by_quarter: &'static str,
    pub in_quarter: [&'static str; 4],
    pub after_q4: &'static str,
    pub other: &'static str,
    pub lead_time_node: &'static str,
}

pub const PAC_AGING: AgingColumns = AgingColumns {
    prefix: "PAC",
    avg_lead_time: "AVG PAC Lead-Time",
    over_185: "PAC>185",
    over_185_label: "PAC>185 Days",
    days_elapsed: "PAC Days > 185 days as of last month",
    amt_elapsed: "PAC amt. > 185 days as of last month",
    lead_time_last_month: "PAC LT last M",
    lead_time_change: "PAC changes",
    if_has_value: "If PAC has value",
    delay_filter: "PAC Delay filter",
    change_icon: "PAC change icon",
    change_icon_label: "PAC delay",
    over_185_cpm: "PAC>185 for CPM",
    over_185_cpm_label: "PAC>185 Days",
    over_185_amt: "PAC>185 amt.(LT)",
    by_year: "PAC by Year",
    by_quarter: "PAC by Q",
    in_quarter: ["PAC in Q1", "PAC in Q2", "PAC in Q3", "PAC in Q4"],
    after_q4: "PAC after Q4",
    other: "PAC other",
    lead_time_node: "PAC lead time node",
};

pub const FAC_AGING: AgingColumns = AgingColumns {
    prefix: "FAC",
    avg_lead_time: "AVG FAC Lead-Time",
    over_185: "FAC>185",
    over_185_label: "FAC>185 days",
    days_elapsed: "FAC Days > 185 days as of last month",
    amt_elapsed: "FAC amt. > 185 days as of last month",
    lead_time_last_month: "FAC LT last M",
    lead_time_change: "FAC Change",
    if_has_value: "If FAC has value",
    delay_filter: "FAC Delay filter",
    change_icon: "FAC change icon",
    change_icon_label: "FAC delay",
    over_185_cpm: "FAC>185 for CPM",
    over_185_cpm_label: "FAC>185 Days",
    over_185_amt: "FAC>185 amt.(LT)",
    by_year: "FAC by Year",
    by_quarter: "FAC by Q",
    in_quarter: ["FAC in Q1", "FAC in Q2", "FAC in Q3", "FAC in Q4"],
    after_q4: "FAC after Q4",
    other: "FAC other",
    lead_time_node: "FAC lead time node",
};
