use super::*;

fn pin_validator() -> Validator {
    Validator::new(ValidationPolicy::pin()).expect("pin policy")
}

fn free_form_validator() -> Validator {
    Validator::new(ValidationPolicy::free_form()).expect("free-form policy")
}

#[test]
fn pin_policy_username_needs_three_alphanumerics() {
    let validator = pin_validator();
    assert!(validator.validate_username("abc"));
    assert!(validator.validate_username("Player1WithAVeryLongName2024"));
    assert!(!validator.validate_username("ab"));
    assert!(!validator.validate_username(""));
    assert!(!validator.validate_username("abc def"));
    assert!(!validator.validate_username("abc_def"));
    assert!(!validator.validate_username("josé123"));
    assert!(!validator.validate_username("abc\n"));
}

#[test]
fn free_form_username_is_bounded_to_twelve() {
    let validator = free_form_validator();
    assert!(validator.validate_username("abcdef"));
    assert!(validator.validate_username("abcdef123456"));
    assert!(!validator.validate_username("abcde"));
    assert!(!validator.validate_username("abcdef1234567"));
}

#[test]
fn pin_password_is_exactly_six_ascii_digits() {
    let validator = pin_validator();
    assert!(validator.validate_password("123456"));
    assert!(validator.validate_password("000000"));
    assert!(!validator.validate_password("12345"));
    assert!(!validator.validate_password("1234567"));
    assert!(!validator.validate_password("12345a"));
    assert!(!validator.validate_password("١٢٣٤٥٦"));
}

#[test]
fn free_form_password_counts_characters() {
    let validator = free_form_validator();
    assert!(validator.validate_password("abcdef"));
    assert!(validator.validate_password("pässwörd"));
    assert!(validator.validate_password("日本語のパス"));
    assert!(!validator.validate_password("abcde"));
}

#[test]
fn inverted_username_bounds_are_rejected() {
    let policy = ValidationPolicy {
        username_min: 8,
        username_max: Some(4),
        ..ValidationPolicy::pin()
    };
    assert!(Validator::new(policy).is_err());
}

#[test]
fn username_error_names_the_bounds() {
    let err = pin_validator().check_username("ab").expect_err("too short");
    assert_eq!(err.field, Field::Username);
    assert_eq!(err.message, "Username must be at least 3 letters or digits");

    let err = free_form_validator()
        .check_username("abc")
        .expect_err("too short");
    assert_eq!(err.message, "Username must be 6-12 letters or digits");
}

#[test]
fn registration_checks_fields_in_form_order() {
    let validator = free_form_validator();

    let err = validator
        .check_registration("ab", "short", Some("other"))
        .expect_err("username first");
    assert_eq!(err.field, Field::Username);

    let err = validator
        .check_registration("player01", "short", Some("other"))
        .expect_err("confirmation second");
    assert_eq!(err.field, Field::Confirmation);
    assert_eq!(err.message, "Passwords do not match");

    let err = validator
        .check_registration("player01", "short", Some("short"))
        .expect_err("length last");
    assert_eq!(err.field, Field::Password);
    assert_eq!(err.message, "Password must be at least 6 characters");

    validator
        .check_registration("player01", "secret!", Some("secret!"))
        .expect("valid registration");
}

#[test]
fn pin_registration_ignores_confirmation() {
    let validator = pin_validator();
    validator
        .check_registration("player1", "123456", None)
        .expect("valid");

    let err = validator
        .check_registration("player1", "12345x", None)
        .expect_err("bad pin");
    assert_eq!(err.field, Field::Password);
    assert_eq!(err.message, "Password must be 6 digits");
}

#[test]
fn login_username_check_follows_policy() {
    pin_validator().check_login("ab").expect("pin policy skips login check");
    let err = free_form_validator()
        .check_login("ab")
        .expect_err("free-form policy checks login");
    assert_eq!(err.field, Field::Username);
}
