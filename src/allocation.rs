//! Waterfall split of the outstanding amount across payment-term buckets.
//!
//! The FAC+ACT reserve is filled first, then PAC, and whatever is left belongs
//! to DEL. Term percentages are whole percentages of the contract value.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentTerms {
    pub dac: f64,
    pub pac: f64,
    pub fac: f64,
    pub act: f64,
}

impl PaymentTerms {
    /// Parses a `;`-separated term string such as `"70;20;5;5"`. Missing or
    /// non-numeric parts count as zero.
    pub fn parse(text: &str) -> Self {
        let parts: Vec<f64> = text
            .split(';')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| p.parse::<f64>().ok().filter(|v| !v.is_nan()).unwrap_or(0.0))
            .collect();
        let at = |i: usize| parts.get(i).copied().unwrap_or(0.0);
        Self {
            dac: at(0),
            pac: at(1),
            fac: at(2),
            act: at(3),
        }
    }

    /// Value kept back for FAC and ACT.
    pub fn fac_reserve(&self, contract_value: f64) -> f64 {
        contract_value * (self.fac + self.act) / 100.0
    }

    /// Value kept back for PAC, FAC and ACT together.
    pub fn pac_reserve(&self, contract_value: f64) -> f64 {
        contract_value * (self.pac + self.fac + self.act) / 100.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub del: f64,
    pub pac: f64,
    pub fac: f64,
}

impl Allocation {
    pub fn total(&self) -> f64 {
        self.del + self.pac + self.fac
    }
}

pub fn allocate(total: f64, terms: &PaymentTerms, contract_value: f64) -> Allocation {
    let fac_reserve = terms.fac_reserve(contract_value);
    let pac_reserve = terms.pac_reserve(contract_value);

    let del = if total <= pac_reserve {
        0.0
    } else {
        total - pac_reserve
    };

    let pac = if total > fac_reserve && total <= pac_reserve {
        total - fac_reserve
    } else if total > pac_reserve {
        contract_value * terms.pac / 100.0
    } else {
        0.0
    };

    let fac = if total < fac_reserve {
        total
    } else {
        fac_reserve
    };

    Allocation { del, pac, fac }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(pac: f64, fac: f64, act: f64) -> PaymentTerms {
        PaymentTerms {
            dac: 100.0 - pac - fac - act,
            pac,
            fac,
            act,
        }
    }

    #[test]
    fn test_fac_reserve_absorbs_small_balance() {
        let a = allocate(50.0, &terms(10.0, 5.0, 5.0), 1000.0);
        assert_eq!(a, Allocation { del: 0.0, pac: 0.0, fac: 50.0 });
    }

    #[test]
    fn test_pac_takes_the_middle_tier() {
        let a = allocate(120.0, &terms(10.0, 5.0, 5.0), 1000.0);
        assert_eq!(a, Allocation { del: 0.0, pac: 20.0, fac: 100.0 });
    }

    #[test]
    fn test_del_takes_the_remainder() {
        let a = allocate(250.0, &terms(10.0, 5.0, 5.0), 1000.0);
        assert_eq!(a, Allocation { del: 50.0, pac: 100.0, fac: 100.0 });
    }

    #[test]
    fn test_tiers_sum_to_total() {
        let t = terms(20.0, 7.5, 2.5);
        for total in [0.0, 1.0, 99.9, 100.0, 100.1, 300.0, 300.5, 1000.0] {
            let a = allocate(total, &t, 1000.0);
            assert!((a.total() - total).abs() < 1e-9, "total {} gave {:?}", total, a);
        }
    }

    #[test]
    fn test_exact_boundaries() {
        let t = terms(10.0, 5.0, 5.0);
        assert_eq!(allocate(100.0, &t, 1000.0), Allocation { del: 0.0, pac: 0.0, fac: 100.0 });
        assert_eq!(allocate(200.0, &t, 1000.0), Allocation { del: 0.0, pac: 100.0, fac: 100.0 });
    }

    #[test]
    fn test_parse_terms() {
        let t = PaymentTerms::parse("70; 20 ;5;5");
        assert_eq!(t, PaymentTerms { dac: 70.0, pac: 20.0, fac: 5.0, act: 5.0 });

        let partial = PaymentTerms::parse("90;;x");
        assert_eq!(partial, PaymentTerms { dac: 90.0, pac: 0.0, fac: 0.0, act: 0.0 });

        assert_eq!(PaymentTerms::parse(""), PaymentTerms::default());
    }
}
