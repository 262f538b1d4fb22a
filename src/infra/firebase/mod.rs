// Firebase Authentication is the identity provider: the client signs in with
// Google through Firebase and sends the resulting ID token as a bearer token.

pub mod token_verifier;

pub use token_verifier::FirebaseTokenVerifier;
