//! Keyboard builders
//!
//! Buttons carry typed actions; the localized label is presentation only.

use vitrina_delivery::{Button, Keyboard};
use vitrina_i18n::Localizer;
use vitrina_types::{ButtonAction, JournalPeriod, Language, MenuCommand, Role};

/// Role-filtered main menu
pub fn main_menu(localizer: &Localizer, language: Language, role: Role) -> Keyboard {
    let commands: &[(&str, MenuCommand)] = match role {
        Role::Admin => &[
            ("products", MenuCommand::Products),
            ("vitrines", MenuCommand::Vitrines),
            ("take_product", MenuCommand::TakeProduct),
            ("transfer", MenuCommand::Transfer),
            ("reports", MenuCommand::Reports),
            ("operations", MenuCommand::Operations),
            ("change_language", MenuCommand::ChangeLanguage),
        ],
        Role::Vitrine => &[
            ("products", MenuCommand::Products),
            ("sales", MenuCommand::Sales),
            ("returns", MenuCommand::Returns),
            ("reports", MenuCommand::Reports),
            ("change_language", MenuCommand::ChangeLanguage),
        ],
    };

    Keyboard::single_column(
        commands
            .iter()
            .map(|(key, command)| {
                Button::new(localizer.text(key, language), ButtonAction::Menu(*command))
            })
            .collect(),
    )
}

/// Language pick, one button per supported language
pub fn languages() -> Keyboard {
    Keyboard::single_column(
        Language::ALL
            .iter()
            .map(|lang| Button::new(lang.native_name(), ButtonAction::SelectLanguage(*lang)))
            .collect(),
    )
}

/// Vitrine selection plus a back button
pub fn vitrines(localizer: &Localizer, language: Language, names: &[String]) -> Keyboard {
    let buttons = names
        .iter()
        .map(|name| {
            Button::new(name.clone(), ButtonAction::SelectVitrine { name: name.clone() })
        })
        .collect();
    with_back(Keyboard::single_column(buttons), localizer, language)
}

/// Product selection plus a back button
pub fn products(localizer: &Localizer, language: Language, names: &[String]) -> Keyboard {
    let buttons = names
        .iter()
        .map(|name| {
            Button::new(name.clone(), ButtonAction::SelectProduct { name: name.clone() })
        })
        .collect();
    with_back(Keyboard::single_column(buttons), localizer, language)
}

/// Journal period pick
pub fn periods(localizer: &Localizer, language: Language) -> Keyboard {
    let choices = [
        ("all_operations", JournalPeriod::All),
        ("today", JournalPeriod::Today),
        ("week", JournalPeriod::Week),
        ("month", JournalPeriod::Month),
        ("export_csv", JournalPeriod::ExportCsv),
    ];
    with_back(
        Keyboard::single_column(
            choices
                .iter()
                .map(|(key, period)| {
                    Button::new(localizer.text(key, language), ButtonAction::Period(*period))
                })
                .collect(),
        ),
        localizer,
        language,
    )
}

/// A lone back button (mid-pipeline prompts without selections)
pub fn back_only(localizer: &Localizer, language: Language) -> Keyboard {
    with_back(Keyboard::new(), localizer, language)
}

fn with_back(keyboard: Keyboard, localizer: &Localizer, language: Language) -> Keyboard {
    keyboard.row(vec![Button::new(
        localizer.text("back_to_main", language),
        ButtonAction::BackToMain,
    )])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn localizer() -> Localizer {
        Localizer::new(Language::En).unwrap()
    }

    #[test]
    fn menus_are_role_filtered() {
        let l = localizer();
        let admin = main_menu(&l, Language::En, Role::Admin);
        let vitrine = main_menu(&l, Language::En, Role::Vitrine);

        let has = |kb: &Keyboard, cmd: MenuCommand| {
            kb.rows
                .iter()
                .flatten()
                .any(|b| b.action == ButtonAction::Menu(cmd))
        };
        assert!(has(&admin, MenuCommand::Transfer));
        assert!(!has(&vitrine, MenuCommand::Transfer));
        assert!(has(&vitrine, MenuCommand::Sales));
        assert!(!has(&admin, MenuCommand::Sales));
        assert!(has(&admin, MenuCommand::ChangeLanguage));
        assert!(has(&vitrine, MenuCommand::ChangeLanguage));
    }

    #[test]
    fn selection_keyboards_end_with_back() {
        let l = localizer();
        let kb = vitrines(&l, Language::En, &["shop-a".to_string()]);
        let last = kb.rows.last().unwrap();
        assert_eq!(last[0].action, ButtonAction::BackToMain);
        assert_eq!(
            kb.rows[0][0].action,
            ButtonAction::SelectVitrine { name: "shop-a".to_string() }
        );
    }
}
