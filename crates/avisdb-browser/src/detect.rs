//! Classification of fetched pages before they reach the parser.
//!
//! The storefront answers unwanted traffic with a captcha interstitial, a
//! login wall, or a generic apology page, all with HTTP 200. Detection is
//! substring-based over the serialized DOM, with French and English
//! indicator sets since the interstitials are not always localized.

/// What a fetched page turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageHealth {
    /// Plausibly the review listing we asked for.
    Ok,
    /// Captcha / robot-check interstitial. Worth rotating identity.
    AntiBot,
    /// Session lost; the site wants credentials.
    LoginWall,
    /// Generic error or empty document.
    ErrorPage,
}

const ANTI_BOT_INDICATORS: &[&str] = &[
    "saisissez les caractères que vous voyez",
    "entrez les caractères",
    "enter the characters you see below",
    "type the characters you see in this image",
    "/errors/validatecaptcha",
    "api-services-support@amazon.com",
    "robot check",
    "vérification nécessaire",
];

const LOGIN_INDICATORS: &[&str] = &[
    "ap/signin",
    "identifiez-vous avec votre adresse e-mail",
    "sign in to your account",
    "mot de passe oublié",
];

const ERROR_INDICATORS: &[&str] = &[
    "toutes nos excuses",
    "nous sommes désolés",
    "désolés, il faut que nous nous assurions",
    "something went wrong on our end",
    "looking for something?",
    "cette page est introuvable",
];

/// Classifies a serialized page. Empty documents count as error pages.
#[must_use]
pub fn classify(html: &str) -> PageHealth {
    if html.trim().is_empty() {
        return PageHealth::ErrorPage;
    }
    let text = html.to_lowercase();
    if ANTI_BOT_INDICATORS.iter().any(|i| text.contains(i)) {
        return PageHealth::AntiBot;
    }
    if LOGIN_INDICATORS.iter().any(|i| text.contains(i)) {
        return PageHealth::LoginWall;
    }
    if ERROR_INDICATORS.iter().any(|i| text.contains(i)) {
        return PageHealth::ErrorPage;
    }
    PageHealth::Ok
}
