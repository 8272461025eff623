use crate::model::{AddressFormat, Branch, PurposeType};

// legacy and Airbitz wallets have no change chain; wrapped-segwit and native
// segwit have both
pub fn supported_branches(format: AddressFormat) -> &'static [Branch] {
    match format.purpose_type() {
        PurposeType::Legacy | PurposeType::Airbitz => &[Branch::Receive],
        PurposeType::WrappedSegwit | PurposeType::Segwit => &[Branch::Receive, Branch::Change],
    }
}

pub fn branch_supported(format: AddressFormat, branch: Branch) -> bool {
    supported_branches(format).contains(&branch)
}
