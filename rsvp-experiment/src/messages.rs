//! Participant-facing texts.

use crate::config::Language;
use crate::summary::Summary;

pub fn ready_begin(language: Language) -> &'static str {
    match language {
        Language::English => "Ready to begin?",
        Language::Spanish => "¿Listo para empezar?",
        Language::French => "Êtes-vous prêt pour commencer ?",
    }
}

pub fn ready_continue(language: Language) -> &'static str {
    match language {
        Language::English => "Ready to continue?",
        Language::Spanish => "¿Listo para continuar?",
        Language::French => "Êtes-vous prêt pour continuer ?",
    }
}

/// Task instructions; names the gamepad when one is connected.
pub fn instructions(language: Language, gamepad: Option<&str>) -> String {
    let body = match language {
        Language::English => {
            "Rapid Serial Visual Presentation\n\n\
             Images will appear one after another in quick succession.\n\
             Press SPACE as quickly as possible whenever you detect the target.\n\
             Try to respond every time you see it.\n\n\
             Press SPACE to start."
        }
        Language::Spanish => {
            "Presentación Visual Serial Rápida\n\n\
             Las imágenes aparecerán una tras otra en rápida sucesión.\n\
             Presiona la BARRA ESPACIADORA lo más rápido posible cuando detectes el objetivo.\n\
             Trata de responder cada vez que lo veas.\n\n\
             Presiona la BARRA ESPACIADORA para empezar."
        }
        Language::French => {
            "Présentation Visuelle Sérielle Rapide\n\n\
             Les images apparaîtront l'une après l'autre en succession rapide.\n\
             Appuyez sur ESPACE le plus rapidement possible quand vous détectez la cible.\n\
             Essayez de répondre chaque fois que vous la voyez.\n\n\
             Appuyez sur ESPACE pour commencer."
        }
    };
    match gamepad {
        Some(name) => {
            let note = match language {
                Language::English => {
                    format!("Gamepad detected: {name}\nPress a gamepad button to respond.")
                }
                Language::Spanish => {
                    format!("Mando detectado: {name}\nPresiona un botón del mando para responder.")
                }
                Language::French => {
                    format!("Manette détectée : {name}\nAppuyez sur un bouton de la manette pour répondre.")
                }
            };
            format!("{body}\n\n{note}")
        }
        None => body.to_string(),
    }
}

pub fn completion(language: Language, summary: &Summary) -> String {
    let accuracy = summary.accuracy.unwrap_or(0.0);
    let mean_rt = summary.mean_reaction_time.unwrap_or(0.0);
    let n = summary.total_responses;
    match language {
        Language::English => format!(
            "Experiment complete!\n\nResponses: {n}\nAccuracy: {accuracy:.1}%\nMean RT: {mean_rt:.3}s\n\n\
             Thank you for participating!\nPress any key to exit."
        ),
        Language::Spanish => format!(
            "¡Experimento completado!\n\nRespuestas: {n}\nPrecisión: {accuracy:.1}%\nTR medio: {mean_rt:.3}s\n\n\
             ¡Gracias por participar!\nPresiona una tecla para salir."
        ),
        Language::French => format!(
            "Expérience terminée !\n\nRéponses : {n}\nPrécision : {accuracy:.1}%\nTR moyen : {mean_rt:.3}s\n\n\
             Merci de votre participation !\nAppuyez sur une touche pour quitter."
        ),
    }
}
