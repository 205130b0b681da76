//! Built-in method catalog.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::currency::Currency;
use crate::method::{FeeSchedule, MethodType, PaymentMethod};
use crate::registry::{RegionSpec, UNIVERSAL_COUNTRY};

struct Country {
    code: &'static str,
    name: &'static str,
    region: &'static str,
    currency: Currency,
}

const NIGERIA: Country = Country {
    code: "NG",
    name: "Nigeria",
    region: "West Africa",
    currency: Currency::NGN,
};
const KENYA: Country = Country {
    code: "KE",
    name: "Kenya",
    region: "East Africa",
    currency: Currency::KES,
};
const GHANA: Country = Country {
    code: "GH",
    name: "Ghana",
    region: "West Africa",
    currency: Currency::GHS,
};
const SOUTH_AFRICA: Country = Country {
    code: "ZA",
    name: "South Africa",
    region: "Southern Africa",
    currency: Currency::ZAR,
};
const INDIA: Country = Country {
    code: "IN",
    name: "India",
    region: "South Asia",
    currency: Currency::INR,
};
const PHILIPPINES: Country = Country {
    code: "PH",
    name: "Philippines",
    region: "Southeast Asia",
    currency: Currency::PHP,
};
const UNITED_STATES: Country = Country {
    code: "US",
    name: "United States",
    region: "Global",
    currency: Currency::USD,
};

/// Fields that vary between catalog entries of the same country.
struct Entry {
    id: &'static str,
    method_type: MethodType,
    provider_name: &'static str,
    provider_code: &'static str,
    gateway: Option<&'static str>,
    min: Decimal,
    max: Decimal,
    deposit_fee: FeeSchedule,
    withdrawal_fee: FeeSchedule,
    minutes: u32,
    description: Option<&'static str>,
}

fn method(country: &Country, e: Entry) -> PaymentMethod {
    PaymentMethod {
        id: e.id.to_string(),
        region: country.region.to_string(),
        country_code: country.code.to_string(),
        country_name: country.name.to_string(),
        method_type: e.method_type,
        provider_code: e.provider_code.to_string(),
        provider_name: e.provider_name.to_string(),
        gateway: e.gateway.map(str::to_string),
        currency: country.currency,
        deposit_enabled: true,
        withdrawal_enabled: true,
        min_amount: e.min,
        max_amount: e.max,
        deposit_fee: e.deposit_fee,
        withdrawal_fee: e.withdrawal_fee,
        processing_time_minutes: e.minutes,
        description: e.description.map(str::to_string),
    }
}

/// Bank transfer: free deposits, flat withdrawal fee, next-day settlement.
fn bank(
    country: &Country,
    id: &'static str,
    provider_name: &'static str,
    provider_code: &'static str,
    max: Decimal,
    withdrawal_flat: Decimal,
    gateway: Option<&'static str>,
) -> PaymentMethod {
    method(
        country,
        Entry {
            id,
            method_type: MethodType::Bank,
            provider_name,
            provider_code,
            gateway,
            min: dec!(100),
            max,
            deposit_fee: FeeSchedule::flat(Decimal::ZERO),
            withdrawal_fee: FeeSchedule::flat(withdrawal_flat),
            minutes: 1440,
            description: None,
        },
    )
}

/// Wallet-style method (mobile money or e-wallet) with the same percentage
/// fee in both directions.
#[allow(clippy::too_many_arguments)]
fn wallet(
    country: &Country,
    method_type: MethodType,
    id: &'static str,
    provider_name: &'static str,
    min: Decimal,
    max: Decimal,
    pct: Decimal,
    minutes: u32,
    gateway: Option<&'static str>,
    description: Option<&'static str>,
) -> PaymentMethod {
    method(
        country,
        Entry {
            id,
            method_type,
            provider_name,
            provider_code: id,
            gateway,
            min,
            max,
            deposit_fee: FeeSchedule::percentage(pct),
            withdrawal_fee: FeeSchedule::percentage(pct),
            minutes,
            description,
        },
    )
}

fn crypto(
    id: &'static str,
    provider_name: &'static str,
    provider_code: &'static str,
    currency: Currency,
    min: Decimal,
    max: Decimal,
    description: &'static str,
) -> PaymentMethod {
    PaymentMethod {
        id: id.to_string(),
        region: "Global".to_string(),
        country_code: UNIVERSAL_COUNTRY.to_string(),
        country_name: "International".to_string(),
        method_type: MethodType::Crypto,
        provider_code: provider_code.to_string(),
        provider_name: provider_name.to_string(),
        gateway: Some("crypto".to_string()),
        currency,
        deposit_enabled: true,
        withdrawal_enabled: true,
        min_amount: min,
        max_amount: max,
        deposit_fee: FeeSchedule::FREE,
        withdrawal_fee: FeeSchedule::FREE,
        processing_time_minutes: 30,
        description: Some(description.to_string()),
    }
}

pub(crate) fn builtin_methods() -> Vec<PaymentMethod> {
    use MethodType::{Ewallet, Mobile};

    let paystack = Some("paystack");
    let flutterwave = Some("flutterwave");

    let mut methods = vec![
        // Nigeria
        bank(&NIGERIA, "access_bank_ng", "Access Bank", "access_bank", dec!(1000000), dec!(50), paystack),
        bank(&NIGERIA, "gtbank_ng", "GTBank", "gtbank", dec!(1000000), dec!(50), paystack),
        bank(&NIGERIA, "first_bank_ng", "First Bank", "first_bank", dec!(1000000), dec!(50), paystack),
        bank(&NIGERIA, "zenith_bank_ng", "Zenith Bank", "zenith_bank", dec!(1000000), dec!(50), paystack),
        wallet(&NIGERIA, Mobile, "mtn_momo_ng", "MTN Mobile Money", dec!(100), dec!(500000), dec!(1.5), 5, flutterwave, Some("MTN mobile money wallet")),
        wallet(&NIGERIA, Mobile, "airtel_money_ng", "Airtel Money", dec!(100), dec!(500000), dec!(1.5), 5, flutterwave, None),
        wallet(&NIGERIA, Ewallet, "paystack_ng", "Paystack", dec!(100), dec!(5000000), dec!(1.5), 2, paystack, Some("Payment gateway")),
        wallet(&NIGERIA, Ewallet, "flutterwave_ng", "Flutterwave", dec!(100), dec!(5000000), dec!(1.8), 2, flutterwave, None),
        wallet(&NIGERIA, Ewallet, "opay_ng", "OPay", dec!(100), dec!(1000000), dec!(1.0), 1, flutterwave, Some("OPay wallet")),
        // Kenya
        bank(&KENYA, "kcb_bank_ke", "KCB Bank", "kcb_bank", dec!(1000000), dec!(50), flutterwave),
        bank(&KENYA, "equity_bank_ke", "Equity Bank", "equity_bank", dec!(1000000), dec!(50), flutterwave),
        wallet(&KENYA, Mobile, "mpesa_ke", "M-Pesa", dec!(50), dec!(500000), dec!(0.5), 1, Some("mpesa"), Some("Safaricom M-Pesa")),
        wallet(&KENYA, Ewallet, "pesapal_ke", "Pesapal", dec!(100), dec!(1000000), dec!(2.0), 5, None, None),
        // Ghana
        bank(&GHANA, "ecobank_gh", "Ecobank Ghana", "ecobank_gh", dec!(1000000), dec!(50), paystack),
        wallet(&GHANA, Mobile, "mtn_momo_gh", "MTN Mobile Money", dec!(100), dec!(500000), dec!(1.0), 5, paystack, None),
        // South Africa
        bank(&SOUTH_AFRICA, "fnb_za", "FNB", "fnb_za", dec!(2000000), dec!(50), paystack),
        bank(&SOUTH_AFRICA, "standard_bank_za", "Standard Bank", "standard_bank_za", dec!(2000000), dec!(50), paystack),
        // India
        bank(&INDIA, "icici_bank_in", "ICICI Bank", "icici_bank_in", dec!(5000000), dec!(100), None),
        bank(&INDIA, "hdfc_bank_in", "HDFC Bank", "hdfc_bank_in", dec!(5000000), dec!(100), None),
        wallet(&INDIA, Ewallet, "paytm_in", "PayTM", dec!(100), dec!(1000000), dec!(2.0), 2, None, Some("PayTM wallet")),
        // Philippines
        bank(&PHILIPPINES, "bdo_ph", "BDO Unibank", "bdo_ph", dec!(5000000), dec!(50), None),
        wallet(&PHILIPPINES, Mobile, "gcash_ph", "GCash", dec!(50), dec!(500000), dec!(1.0), 2, None, Some("GCash mobile wallet")),
        wallet(&PHILIPPINES, Ewallet, "paymaya_ph", "PayMaya", dec!(100), dec!(1000000), dec!(2.0), 5, None, None),
    ];

    // Google Pay carries explicit zero fees rather than a percentage.
    methods.push(method(
        &INDIA,
        Entry {
            id: "gpay_in",
            method_type: Ewallet,
            provider_name: "Google Pay",
            provider_code: "gpay_in",
            gateway: None,
            min: dec!(100),
            max: dec!(1000000),
            deposit_fee: FeeSchedule::flat(Decimal::ZERO),
            withdrawal_fee: FeeSchedule::flat(Decimal::ZERO),
            minutes: 1,
            description: Some("Google Pay"),
        },
    ));

    // Cards settle to the platform only; there is no card payout.
    let mut stripe = method(
        &UNITED_STATES,
        Entry {
            id: "stripe_us",
            method_type: MethodType::Card,
            provider_name: "Credit/Debit Card (Stripe)",
            provider_code: "stripe_us",
            gateway: Some("stripe"),
            min: dec!(100),
            max: dec!(5000000),
            deposit_fee: FeeSchedule::mixed(dec!(2.9), dec!(0.30)),
            withdrawal_fee: FeeSchedule::FREE,
            minutes: 5,
            description: Some("Visa, Mastercard, Amex"),
        },
    );
    stripe.withdrawal_enabled = false;
    methods.push(stripe);

    methods.push(crypto("bitcoin", "Bitcoin", "btc", Currency::BTC, dec!(0.001), dec!(100), "Bitcoin blockchain"));
    methods.push(crypto("ethereum", "Ethereum", "eth", Currency::ETH, dec!(0.01), dec!(1000), "Ethereum blockchain"));

    methods
}

pub(crate) fn builtin_regions() -> Vec<RegionSpec> {
    [
        (&NIGERIA, "en-NG", "+234"),
        (&KENYA, "en-KE", "+254"),
        (&GHANA, "en-GH", "+233"),
        (&SOUTH_AFRICA, "en-ZA", "+27"),
        (&INDIA, "en-IN", "+91"),
        (&PHILIPPINES, "en-PH", "+63"),
        (&UNITED_STATES, "en-US", "+1"),
    ]
    .into_iter()
    .map(|(c, locale, prefix)| RegionSpec {
        region: c.region.to_string(),
        country_code: c.code.to_string(),
        country_name: c.name.to_string(),
        currency: c.currency,
        locale: locale.to_string(),
        phone_prefix: prefix.to_string(),
    })
    .collect()
}
